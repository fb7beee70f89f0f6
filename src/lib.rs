//! Mirrors cluster-managed virtual machines into AWX inventories
//!
//! This crate watches VirtualMachine resources in a cluster and keeps AWX
//! inventories in sync, one inventory per source namespace. The core is an
//! event-driven reconciliation engine that converts each change notification
//! into idempotent operations against the AWX API, so that replaying the
//! full snapshot after a watch reconnect converges to the same remote state.

pub mod adapters;
pub mod bootstrap;
pub mod controller;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod watch;

// Re-export commonly used types
pub use controller::{EngineSettings, InventoryCache, ReconciliationEngine};
pub use domain::{ChangeKind, ChangeNotification, HostVariables, VmRecord};
pub use errors::{SyncError, SyncResult};
pub use gateway::{GatewayError, InventoryGateway};
pub use watch::{VmStream, VmWatcher, WatchError};
