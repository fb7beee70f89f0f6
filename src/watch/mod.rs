// Copyright (c) 2025 - Cowboy AI, Inc.

//! Cluster watch subscription seam

pub mod kube;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::ChangeNotification;

pub use kube::{KubeConfig, KubeWatcher};

/// Stream of change notifications from one subscription.
///
/// The stream ends when the underlying channel closes; it does not restart
/// itself. The consumer re-subscribes.
pub type VmStream = BoxStream<'static, ChangeNotification>;

/// Errors that can occur establishing a watch
#[derive(Debug, Error)]
pub enum WatchError {
    /// Cluster connection details are missing or unreadable
    #[error("watch configuration error: {0}")]
    Configuration(String),

    /// The watch request could not be sent
    #[error("failed to start watch: {0}")]
    Connect(String),

    /// The cluster API rejected the watch request
    #[error("watch API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Result type for watch operations
pub type WatchResult<T> = std::result::Result<T, WatchError>;

/// Subscription primitive for virtual machine change notifications.
///
/// Each notification carries the full current object body, not a diff. A
/// fresh subscription re-delivers the current snapshot as a sequence of
/// Added notifications, which the engine's idempotent upserts absorb.
#[async_trait]
pub trait VmWatcher: Send + Sync {
    /// Open one subscription
    async fn subscribe(&self) -> WatchResult<VmStream>;
}
