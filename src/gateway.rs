// Copyright (c) 2025 - Cowboy AI, Inc.

//! Remote inventory gateway seam
//!
//! The remote automation-inventory system offers no transactional semantics,
//! so every primitive here must be safe to repeat: upserts find-then-patch,
//! deletes treat a missing host as success, and creates resolve conflicts by
//! falling back to a lookup. This idempotence is what makes the engine's
//! full-snapshot replay after a watch reconnect converge.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::HostVariables;

/// Errors that can occur talking to the remote inventory
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The remote system could not be reached
    #[error("inventory gateway unreachable: {0}")]
    Unavailable(String),

    /// The remote system rejected an operation
    #[error("inventory API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Find/create/update/delete primitives of the remote inventory.
///
/// All calls carry a bearer credential and are blocking request/response with
/// a fixed client-side timeout enforced by the HTTP layer.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Reachability probe
    async fn ping(&self) -> GatewayResult<()>;

    /// Look up an organization id by name
    async fn find_organization(&self, name: &str) -> GatewayResult<Option<i64>>;

    /// Look up an inventory id by name
    async fn find_inventory(&self, name: &str) -> GatewayResult<Option<i64>>;

    /// Create an inventory under an organization.
    ///
    /// A conflicting concurrent create resolves to the existing inventory's
    /// id instead of failing.
    async fn create_inventory(&self, name: &str, org_id: i64) -> GatewayResult<i64>;

    /// Look up a host id by name within an inventory
    async fn find_host(&self, inventory_id: i64, name: &str) -> GatewayResult<Option<i64>>;

    /// Create the host or patch it if it already exists
    async fn upsert_host(
        &self,
        inventory_id: i64,
        name: &str,
        variables: &HostVariables,
    ) -> GatewayResult<()>;

    /// Delete a host by name; a host that does not exist is a successful no-op
    async fn delete_host(&self, inventory_id: i64, name: &str) -> GatewayResult<()>;

    /// Look up a group by name within an inventory, creating it when absent
    async fn find_or_create_group(&self, inventory_id: i64, name: &str) -> GatewayResult<i64>;

    /// Add a host to a group; an existing membership is success
    async fn add_host_to_group(&self, group_id: i64, host_id: i64) -> GatewayResult<()>;
}
