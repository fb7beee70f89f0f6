// Copyright (c) 2025 - Cowboy AI, Inc.

//! AWX REST adapter
//!
//! Implements [`InventoryGateway`] against the AWX v2 API.
//!
//! # AWX Data Model
//!
//! - **Organizations**: top-level owners of inventories
//! - **Inventories**: named collections of hosts, one per source namespace
//! - **Hosts**: reachable targets, keyed by name within an inventory
//! - **Groups**: named host groupings within an inventory
//!
//! Collection endpoints return a paged envelope (`{"results": [...]}`); a
//! name-filtered query yields at most one result because AWX enforces name
//! uniqueness within the queried scope. Host variables travel as a JSON
//! string inside the `variables` field — the typed [`HostVariables`] document
//! is serialized to that representation here and nowhere else.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::HostVariables;
use crate::gateway::{GatewayError, GatewayResult, InventoryGateway};

/// Configuration for the AWX connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwxConfig {
    /// AWX base URL (e.g., "https://awx.example.com")
    pub base_url: String,

    /// Bearer token for authentication
    pub token: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for AwxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://awx.example.com".to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Paged list envelope returned by AWX collection endpoints
#[derive(Debug, Deserialize)]
struct ListResponse {
    results: Vec<IdEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdEntry {
    id: i64,
}

#[derive(Debug, Serialize)]
struct CreateInventoryRequest<'a> {
    name: &'a str,
    organization: i64,
}

#[derive(Debug, Serialize)]
struct CreateHostRequest<'a> {
    name: &'a str,
    inventory: i64,
    variables: String,
}

#[derive(Debug, Serialize)]
struct UpdateHostRequest<'a> {
    name: &'a str,
    variables: String,
}

#[derive(Debug, Serialize)]
struct CreateGroupRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct GroupMemberRequest {
    id: i64,
}

/// AWX API client
pub struct AwxClient {
    config: AwxConfig,
    client: Client,
}

impl AwxClient {
    /// Create a new AWX client
    pub fn new(config: AwxConfig) -> GatewayResult<Self> {
        info!("Connecting to AWX at {}", config.base_url);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "Authorization",
                    format!("Bearer {}", config.token).parse().map_err(|e| {
                        GatewayError::Unavailable(format!("Invalid API token: {}", e))
                    })?,
                );
                headers.insert(
                    "Content-Type",
                    "application/json".parse().map_err(|e| {
                        GatewayError::Unavailable(format!("Invalid header: {}", e))
                    })?,
                );
                headers
            })
            .build()
            .map_err(|e| {
                GatewayError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Fetch a name-filtered collection and return the first id, if any
    async fn find_id(&self, path: &str) -> GatewayResult<Option<i64>> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let list: ListResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;

        Ok(list.results.first().map(|entry| entry.id))
    }

    async fn created_id(&self, response: reqwest::Response) -> GatewayResult<i64> {
        let entry: IdEntry = response
            .json()
            .await
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;
        Ok(entry.id)
    }
}

async fn api_error(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    GatewayError::Api { status, body }
}

fn encode_variables(variables: &HostVariables) -> GatewayResult<String> {
    serde_json::to_string(variables).map_err(|e| GatewayError::Serialization(e.to_string()))
}

#[async_trait]
impl InventoryGateway for AwxClient {
    async fn ping(&self) -> GatewayResult<()> {
        let response = self
            .client
            .get(self.url("/api/v2/ping/"))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }

    async fn find_organization(&self, name: &str) -> GatewayResult<Option<i64>> {
        self.find_id(&format!(
            "/api/v2/organizations/?name={}",
            urlencoding::encode(name)
        ))
        .await
    }

    async fn find_inventory(&self, name: &str) -> GatewayResult<Option<i64>> {
        self.find_id(&format!(
            "/api/v2/inventories/?name={}",
            urlencoding::encode(name)
        ))
        .await
    }

    async fn create_inventory(&self, name: &str, org_id: i64) -> GatewayResult<i64> {
        let response = self
            .client
            .post(self.url("/api/v2/inventories/"))
            .json(&CreateInventoryRequest {
                name,
                organization: org_id,
            })
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

        match response.status() {
            StatusCode::CREATED => {
                let id = self.created_id(response).await?;
                debug!(inventory = name, id, "Created inventory");
                Ok(id)
            }
            // Another actor created the inventory first; its id is the answer
            StatusCode::BAD_REQUEST => {
                self.find_inventory(name).await?.ok_or_else(|| GatewayError::Api {
                    status: 400,
                    body: format!("inventory '{}' rejected and not found", name),
                })
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn find_host(&self, inventory_id: i64, name: &str) -> GatewayResult<Option<i64>> {
        self.find_id(&format!(
            "/api/v2/inventories/{}/hosts/?name={}",
            inventory_id,
            urlencoding::encode(name)
        ))
        .await
    }

    async fn upsert_host(
        &self,
        inventory_id: i64,
        name: &str,
        variables: &HostVariables,
    ) -> GatewayResult<()> {
        let encoded = encode_variables(variables)?;

        match self.find_host(inventory_id, name).await? {
            Some(host_id) => {
                let response = self
                    .client
                    .patch(self.url(&format!("/api/v2/hosts/{}/", host_id)))
                    .json(&UpdateHostRequest {
                        name,
                        variables: encoded,
                    })
                    .send()
                    .await
                    .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

                if response.status().is_success() {
                    debug!(host = name, host_id, "Updated host");
                    Ok(())
                } else {
                    Err(api_error(response).await)
                }
            }
            None => {
                let response = self
                    .client
                    .post(self.url(&format!("/api/v2/inventories/{}/hosts/", inventory_id)))
                    .json(&CreateHostRequest {
                        name,
                        inventory: inventory_id,
                        variables: encoded,
                    })
                    .send()
                    .await
                    .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

                if response.status() == StatusCode::CREATED {
                    debug!(host = name, inventory_id, "Created host");
                    Ok(())
                } else {
                    Err(api_error(response).await)
                }
            }
        }
    }

    async fn delete_host(&self, inventory_id: i64, name: &str) -> GatewayResult<()> {
        let Some(host_id) = self.find_host(inventory_id, name).await? else {
            // Nothing to delete
            return Ok(());
        };

        let response = self
            .client
            .delete(self.url(&format!("/api/v2/hosts/{}/", host_id)))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => {
                debug!(host = name, host_id, "Deleted host");
                Ok(())
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn find_or_create_group(&self, inventory_id: i64, name: &str) -> GatewayResult<i64> {
        let path = format!(
            "/api/v2/inventories/{}/groups/?name={}",
            inventory_id,
            urlencoding::encode(name)
        );
        if let Some(id) = self.find_id(&path).await? {
            return Ok(id);
        }

        let response = self
            .client
            .post(self.url(&format!("/api/v2/inventories/{}/groups/", inventory_id)))
            .json(&CreateGroupRequest { name })
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

        match response.status() {
            StatusCode::CREATED => {
                let id = self.created_id(response).await?;
                debug!(group = name, id, "Created group");
                Ok(id)
            }
            // Lost a create race; the group exists now
            StatusCode::BAD_REQUEST => {
                self.find_id(&path).await?.ok_or_else(|| GatewayError::Api {
                    status: 400,
                    body: format!("group '{}' rejected and not found", name),
                })
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn add_host_to_group(&self, group_id: i64, host_id: i64) -> GatewayResult<()> {
        let path = format!("/api/v2/groups/{}/hosts/", group_id);

        let response = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

        if response.status().is_success() {
            let members: ListResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Serialization(e.to_string()))?;

            if members.results.iter().any(|entry| entry.id == host_id) {
                // Host already in group
                return Ok(());
            }
        }

        let response = self
            .client
            .post(self.url(&path))
            .json(&GroupMemberRequest { id: host_id })
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("AWX API error: {}", e)))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            // Host was added concurrently; membership is what matters
            StatusCode::BAD_REQUEST => Ok(()),
            _ => Err(api_error(response).await),
        }
    }
}
