// Copyright (c) 2025 - Cowboy AI, Inc.

//! Kubernetes watch client for VirtualMachine resources
//!
//! A thin typed client over the cluster's watch API. The watch endpoint
//! returns a chunked response body of line-delimited JSON events
//! (`{"type": "ADDED", "object": {...}}`); transport chunk boundaries do not
//! align with event lines, so the body is re-framed through a buffered line
//! reader before decoding.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{VmStream, VmWatcher, WatchError, WatchResult};
use crate::domain::{ChangeKind, ChangeNotification, VmRecord};

/// API group serving VirtualMachine resources
const API_GROUP: &str = "virtualization.deckhouse.io";
const API_VERSION: &str = "v1alpha2";
const RESOURCE: &str = "virtualmachines";

/// In-cluster service account mount paths
const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Configuration for the cluster connection
#[derive(Debug, Clone)]
pub struct KubeConfig {
    /// API server base URL
    pub api_server: String,

    /// Bearer token for authentication
    pub token: String,

    /// Path to the cluster CA bundle
    pub ca_cert_path: Option<PathBuf>,

    /// Namespace scope; `None` watches cluster-wide
    pub namespace: Option<String>,
}

impl KubeConfig {
    /// Build configuration from the in-cluster service account environment
    pub fn in_cluster(namespace: Option<String>) -> WatchResult<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            WatchError::Configuration("KUBERNETES_SERVICE_HOST not set".to_string())
        })?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").map_err(|_| {
            WatchError::Configuration("KUBERNETES_SERVICE_PORT not set".to_string())
        })?;
        let token = std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN)
            .map_err(|e| {
                WatchError::Configuration(format!("failed to read service account token: {}", e))
            })?
            .trim()
            .to_string();

        Ok(Self {
            api_server: format!("https://{}:{}", host, port),
            token,
            ca_cert_path: Some(PathBuf::from(SERVICE_ACCOUNT_CA)),
            namespace,
        })
    }

    fn watch_path(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!(
                "/apis/{}/{}/namespaces/{}/{}",
                API_GROUP, API_VERSION, ns, RESOURCE
            ),
            _ => format!("/apis/{}/{}/{}", API_GROUP, API_VERSION, RESOURCE),
        }
    }
}

/// Watch event envelope as sent by the API server
#[derive(Debug, Deserialize)]
struct WatchEnvelope {
    #[serde(rename = "type")]
    kind: String,
    object: Value,
}

/// Watcher over the cluster's VirtualMachine resources
pub struct KubeWatcher {
    config: KubeConfig,
    client: Client,
}

impl KubeWatcher {
    /// Create a new watcher.
    ///
    /// The HTTP client carries no request timeout: a watch body is unbounded.
    pub fn new(config: KubeConfig) -> WatchResult<Self> {
        let mut builder = Client::builder();

        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                WatchError::Configuration(format!("failed to read CA bundle: {}", e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| WatchError::Configuration(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| WatchError::Connect(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl VmWatcher for KubeWatcher {
    async fn subscribe(&self) -> WatchResult<VmStream> {
        let url = format!(
            "{}{}?watch=true",
            self.config.api_server,
            self.config.watch_path()
        );
        debug!(url = %url, "Opening watch");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| WatchError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::Api { status, body });
        }

        info!(resource = RESOURCE, "Watch established");

        let lines = LineReader::new(response.bytes_stream().boxed());
        let stream = futures::stream::unfold(lines, |mut lines| async move {
            loop {
                let line = lines.next_line().await?;
                if let Some(notification) = decode_line(&line) {
                    return Some((notification, lines));
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// Decode one watch line into a notification.
///
/// Bookmark events, unknown kinds, undecodable lines, and objects without a
/// (namespace, name) key are skipped.
fn decode_line(line: &str) -> Option<ChangeNotification> {
    if line.trim().is_empty() {
        return None;
    }

    let envelope: WatchEnvelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Skipping undecodable watch line");
            return None;
        }
    };

    let kind = match envelope.kind.as_str() {
        "ADDED" => ChangeKind::Added,
        "MODIFIED" => ChangeKind::Modified,
        "DELETED" => ChangeKind::Removed,
        other => {
            debug!(kind = other, "Ignoring watch event");
            return None;
        }
    };

    let record = VmRecord::from_object(&envelope.object)?;
    Some(match kind {
        ChangeKind::Added => ChangeNotification::added(record),
        ChangeKind::Modified => ChangeNotification::modified(record),
        ChangeKind::Removed => ChangeNotification::removed(record.namespace, record.name),
    })
}

/// Buffers a chunked byte stream into newline-delimited frames
struct LineReader<S> {
    stream: S,
    buffer: Vec<u8>,
    done: bool,
}

impl<S, B, E> LineReader<S>
where
    S: futures::Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Next complete line, or `None` once the stream is exhausted.
    ///
    /// A transport error closes the frame stream; the consumer's reconnect
    /// policy takes over from there.
    async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                return Some(String::from_utf8_lossy(&line).into_owned());
            }

            if self.done {
                if self.buffer.is_empty() {
                    return None;
                }
                let line = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                return Some(line);
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    warn!(error = %e, "Watch stream error, closing subscription");
                    self.done = true;
                }
                None => self.done = true,
            }
        }
    }
}
