// Copyright (c) 2025 - Cowboy AI, Inc.

//! VM Inventory Controller
//!
//! Watches VirtualMachine resources in the cluster and mirrors them into AWX
//! inventories, one inventory per source namespace.
//!
//! Run with: cargo run --bin inventory-controller
//!
//! Prerequisites:
//! 1. Runs in-cluster with a service account allowed to watch virtualmachines
//! 2. AWX API reachable (via AWX_URL environment variable)
//! 3. AWX bearer token set (via AWX_TOKEN environment variable)

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use vm_inventory_sync::adapters::{AwxClient, AwxConfig};
use vm_inventory_sync::bootstrap;
use vm_inventory_sync::controller::{EngineSettings, InventoryCache, ReconciliationEngine};
use vm_inventory_sync::watch::{KubeConfig, KubeWatcher};

/// Configuration for the controller process
#[derive(Debug, Clone)]
struct ControllerConfig {
    /// AWX connection settings
    awx: AwxConfig,
    /// Organization owning created inventories
    organization: String,
    /// Optional inventory-name prefix
    prefix: String,
    /// Namespace scope; `None` watches cluster-wide
    namespace: Option<String>,
    /// Readiness poll timeout
    wait_timeout: Duration,
    /// Readiness poll interval
    wait_interval: Duration,
}

impl ControllerConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let awx = AwxConfig {
            base_url: std::env::var("AWX_URL")
                .unwrap_or_else(|_| "https://awx.example.com".to_string()),
            token: std::env::var("AWX_TOKEN").context("AWX_TOKEN not set")?,
            ..AwxConfig::default()
        };

        let organization =
            std::env::var("ORGANIZATION").unwrap_or_else(|_| "Default".to_string());
        let prefix = std::env::var("INVENTORY_PREFIX").unwrap_or_default();
        let namespace = std::env::var("NAMESPACE").ok().filter(|ns| !ns.is_empty());

        Ok(Self {
            awx,
            organization,
            prefix,
            namespace,
            wait_timeout: env_secs("AWX_WAIT_TIMEOUT", bootstrap::DEFAULT_WAIT_TIMEOUT),
            wait_interval: env_secs("AWX_WAIT_INTERVAL", bootstrap::DEFAULT_WAIT_INTERVAL),
        })
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Starting VM Inventory Controller");

    let config = ControllerConfig::from_env()?;
    info!("📋 Configuration loaded:");
    info!("  - AWX URL: {}", config.awx.base_url);
    info!("  - Organization: {}", config.organization);
    info!(
        "  - Inventory prefix: {}",
        if config.prefix.is_empty() {
            "(none)"
        } else {
            &config.prefix
        }
    );
    info!(
        "  - Namespace scope: {}",
        config.namespace.as_deref().unwrap_or("(cluster-wide)")
    );

    let gateway = AwxClient::new(config.awx.clone()).context("Failed to create AWX client")?;

    info!("⏳ Waiting for AWX availability...");
    bootstrap::wait_for_gateway(&gateway, config.wait_timeout, config.wait_interval)
        .await
        .context("AWX did not become available")?;
    bootstrap::resolve_organization(&gateway, &config.organization)
        .await
        .context("Failed to resolve organization")?;
    info!("✅ AWX is available");

    let kube_config = KubeConfig::in_cluster(config.namespace.clone())
        .context("Failed to load in-cluster configuration")?;
    let watcher = KubeWatcher::new(kube_config).context("Failed to create cluster watcher")?;

    let settings = EngineSettings {
        organization: config.organization.clone(),
        prefix: config.prefix.clone(),
        ..EngineSettings::default()
    };
    let mut engine = ReconciliationEngine::new(
        Arc::new(gateway),
        Arc::new(watcher),
        settings,
        InventoryCache::new(),
    );

    // Signal observer: it only signals, it touches no shared state
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("🎧 Starting VirtualMachine watch (existing VMs replay as ADDED events)");
    engine.run(shutdown_rx).await?;

    info!("👋 Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
    }
}
