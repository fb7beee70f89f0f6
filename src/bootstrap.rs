// Copyright (c) 2025 - Cowboy AI, Inc.

//! Startup readiness gate
//!
//! Polls the remote inventory until it is reachable, then verifies the
//! configured organization exists. Runs exactly once before the engine
//! starts; there is no retry beyond the poll loop itself and the gate never
//! runs again during the engine's lifetime.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::{SyncError, SyncResult};
use crate::gateway::InventoryGateway;

/// Default readiness poll timeout
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default readiness poll interval
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// Poll the gateway's health endpoint until it responds or `timeout` elapses
pub async fn wait_for_gateway(
    gateway: &dyn InventoryGateway,
    timeout: Duration,
    interval: Duration,
) -> SyncResult<()> {
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    while Instant::now() < deadline {
        attempt += 1;
        match gateway.ping().await {
            Ok(()) => {
                info!(attempt, "Inventory gateway is available");
                return Ok(());
            }
            Err(e) => {
                debug!(attempt, error = %e, "Inventory gateway not ready");
            }
        }
        tokio::time::sleep(interval).await;
    }

    Err(SyncError::ReadinessTimeout {
        waited_secs: timeout.as_secs(),
    })
}

/// Resolve (never create) the configured organization, failing fast when it
/// does not exist
pub async fn resolve_organization(
    gateway: &dyn InventoryGateway,
    name: &str,
) -> SyncResult<i64> {
    let org_id = gateway
        .find_organization(name)
        .await?
        .ok_or_else(|| SyncError::OrganizationNotFound(name.to_string()))?;

    info!(organization = name, org_id, "Organization resolved");
    Ok(org_id)
}
