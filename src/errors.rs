//! Error types for synchronization operations

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::watch::WatchError;

/// Errors that can occur while mirroring virtual machines into the remote inventory
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote inventory operation failed
    #[error("inventory gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Cluster watch error
    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote inventory did not become reachable in time
    #[error("inventory gateway did not become available within {waited_secs}s")]
    ReadinessTimeout { waited_secs: u64 },

    /// The configured organization does not exist in the remote inventory
    #[error("organization '{0}' not found")]
    OrganizationNotFound(String),
}

/// Result type for synchronization operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;
