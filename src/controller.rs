// Copyright (c) 2025 - Cowboy AI, Inc.

//! Reconciliation engine
//!
//! Drives the subscribe → classify → resolve-inventory → apply loop until
//! cancelled. Notifications are processed one at a time, in delivery order,
//! with no internal concurrency; every gateway call is awaited before the
//! next notification is read. Correctness under at-least-once delivery rests
//! on the gateway's idempotent upsert/delete primitives, not on retrying a
//! failed call: a failed operation is logged and the next notification for
//! the same object (or the snapshot replay after a reconnect) restores
//! consistency.

use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::{ChangeKind, ChangeNotification, HostVariables, VmRecord};
use crate::errors::{SyncError, SyncResult};
use crate::gateway::InventoryGateway;
use crate::watch::VmWatcher;

/// Delay before re-subscribing after the watch channel closes
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Mapping from source namespace to remote inventory id.
///
/// Process-lifetime cache: entries are created lazily on the first
/// notification for a namespace and never removed; rebuilt from empty on
/// restart. At most one entry per namespace. Mutated only by the engine's
/// single sequential worker, so no locking discipline is required.
#[derive(Debug, Default)]
pub struct InventoryCache {
    entries: HashMap<String, i64>,
}

impl InventoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached inventory id for a namespace, if resolved before
    pub fn get(&self, namespace: &str) -> Option<i64> {
        self.entries.get(namespace).copied()
    }

    /// Record the inventory id for a namespace
    pub fn insert(&mut self, namespace: impl Into<String>, inventory_id: i64) {
        self.entries.insert(namespace.into(), inventory_id);
    }

    /// Number of namespaces resolved so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Engine naming and retry parameters
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Organization owning created inventories
    pub organization: String,

    /// Inventory-name prefix; omitted entirely when empty
    pub prefix: String,

    /// Delay before re-subscribing after the watch channel closes
    pub reconnect_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            organization: "Default".to_string(),
            prefix: String::new(),
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Effect of classifying one notification
#[derive(Debug, PartialEq, Eq)]
enum Effect<'a> {
    /// Publish or refresh the host record
    Upsert(&'a VmRecord),
    /// Remove the host record by name
    Delete,
    /// Nothing to publish; `silent` suppresses logging for repeated
    /// address-less Modified events during address assignment
    Skip { silent: bool },
}

/// Event-driven reconciliation engine.
///
/// Owns the namespace → inventory cache and the reconnect policy. The cache
/// is injected so tests can pre-seed or inspect it.
pub struct ReconciliationEngine {
    gateway: Arc<dyn InventoryGateway>,
    watcher: Arc<dyn VmWatcher>,
    settings: EngineSettings,
    cache: InventoryCache,
}

impl ReconciliationEngine {
    /// Create a new engine
    pub fn new(
        gateway: Arc<dyn InventoryGateway>,
        watcher: Arc<dyn VmWatcher>,
        settings: EngineSettings,
        cache: InventoryCache,
    ) -> Self {
        Self {
            gateway,
            watcher,
            settings,
            cache,
        }
    }

    /// The namespace → inventory cache
    pub fn cache(&self) -> &InventoryCache {
        &self.cache
    }

    /// Target inventory name for a namespace: prefix + namespace, with the
    /// prefix omitted entirely when empty
    fn inventory_name(&self, namespace: &str) -> String {
        if self.settings.prefix.is_empty() {
            namespace.to_string()
        } else {
            format!("{} {}", self.settings.prefix, namespace)
        }
    }

    fn classify(notification: &ChangeNotification) -> Effect<'_> {
        match notification.kind {
            ChangeKind::Removed => Effect::Delete,
            ChangeKind::Added | ChangeKind::Modified => match &notification.record {
                Some(record) if record.address().is_some() => Effect::Upsert(record),
                _ => Effect::Skip {
                    silent: notification.kind == ChangeKind::Modified,
                },
            },
        }
    }

    /// Resolve the inventory for a namespace, creating it when absent.
    ///
    /// Cache hits return without any remote call. On a miss the organization
    /// id is re-fetched rather than cached — it is looked up rarely and may
    /// be recreated out of band.
    async fn resolve_inventory(&mut self, namespace: &str) -> SyncResult<i64> {
        if let Some(inventory_id) = self.cache.get(namespace) {
            return Ok(inventory_id);
        }

        let name = self.inventory_name(namespace);

        let org_id = self
            .gateway
            .find_organization(&self.settings.organization)
            .await?
            .ok_or_else(|| SyncError::OrganizationNotFound(self.settings.organization.clone()))?;

        let inventory_id = match self.gateway.find_inventory(&name).await? {
            Some(id) => {
                debug!(inventory = %name, id, "Inventory already exists");
                id
            }
            None => {
                info!(inventory = %name, namespace, "Creating inventory");
                self.gateway.create_inventory(&name, org_id).await?
            }
        };

        self.cache.insert(namespace, inventory_id);
        Ok(inventory_id)
    }

    /// Resolve the inventory for a namespace without creating it.
    ///
    /// Used on the Removed path: a cold cache does not mean the inventory is
    /// absent remotely — it may survive from a previous process lifetime, so
    /// the lookup goes by name before declaring a no-op.
    async fn lookup_inventory(&mut self, namespace: &str) -> SyncResult<Option<i64>> {
        if let Some(inventory_id) = self.cache.get(namespace) {
            return Ok(Some(inventory_id));
        }

        let name = self.inventory_name(namespace);
        let found = self.gateway.find_inventory(&name).await?;
        if let Some(inventory_id) = found {
            self.cache.insert(namespace, inventory_id);
        }
        Ok(found)
    }

    /// Apply one notification.
    ///
    /// Errors are returned for the run loop to log with the notification's
    /// context; they never terminate the loop.
    pub async fn handle_notification(
        &mut self,
        notification: &ChangeNotification,
    ) -> SyncResult<()> {
        match Self::classify(notification) {
            Effect::Upsert(record) => {
                let Some(variables) = HostVariables::from_record(record) else {
                    return Ok(());
                };
                let inventory_id = self.resolve_inventory(&notification.namespace).await?;
                self.gateway
                    .upsert_host(inventory_id, &notification.name, &variables)
                    .await?;
                info!(
                    namespace = %notification.namespace,
                    name = %notification.name,
                    address = %variables.ansible_host,
                    "Host upserted"
                );
                Ok(())
            }
            Effect::Delete => {
                let Some(inventory_id) = self.lookup_inventory(&notification.namespace).await?
                else {
                    // No inventory for this namespace, locally or remotely;
                    // nothing could have been published
                    debug!(
                        namespace = %notification.namespace,
                        name = %notification.name,
                        "No inventory for namespace, nothing to delete"
                    );
                    return Ok(());
                };
                self.gateway
                    .delete_host(inventory_id, &notification.name)
                    .await?;
                info!(
                    namespace = %notification.namespace,
                    name = %notification.name,
                    "Host deleted"
                );
                Ok(())
            }
            Effect::Skip { silent } => {
                if !silent {
                    info!(
                        namespace = %notification.namespace,
                        name = %notification.name,
                        "No address assigned yet, skipping"
                    );
                }
                Ok(())
            }
        }
    }

    /// Run the subscription loop until cancelled.
    ///
    /// On unexpected stream closure the engine waits a fixed delay and
    /// re-subscribes from scratch, indefinitely — the watch API re-delivers
    /// the current snapshot as Added events on a fresh subscription, which
    /// the idempotent upserts absorb. A `subscribe` failure itself (initial
    /// or on reconnect) is unrecoverable and propagates to the caller.
    ///
    /// Cancellation is cooperative: the flag is checked at the
    /// subscription-read boundary, and an in-flight gateway call is allowed
    /// to finish before the loop notices.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> SyncResult<()> {
        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, stopping engine");
                return Ok(());
            }

            let mut stream = self.watcher.subscribe().await?;
            info!("Watch subscription established");

            loop {
                let notification = tokio::select! {
                    _ = shutdown.wait_for(|stop| *stop) => {
                        info!("Shutdown requested, closing subscription");
                        return Ok(());
                    }
                    next = stream.next() => match next {
                        Some(notification) => notification,
                        None => break,
                    },
                };

                debug!(
                    kind = %notification.kind,
                    namespace = %notification.namespace,
                    name = %notification.name,
                    "Event received"
                );

                if let Err(e) = self.handle_notification(&notification).await {
                    error!(
                        kind = %notification.kind,
                        namespace = %notification.namespace,
                        name = %notification.name,
                        error = %e,
                        "Failed to process notification"
                    );
                }
            }

            warn!(
                delay_secs = self.settings.reconnect_delay.as_secs(),
                "Watch channel closed, re-subscribing"
            );
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("Shutdown requested, stopping engine");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
            }
        }
    }
}
