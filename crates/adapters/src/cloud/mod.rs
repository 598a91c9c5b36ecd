// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud adapter: typed surface over the IaaS provider.

mod hetzner;

pub use hetzner::HetznerCloud;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CloudCall, FakeCloud};

use async_trait::async_trait;
use ghr_core::catalog::{ImageInfo, LocationInfo, PriceCatalog, ServerTypeInfo, SshKeyInfo};
use ghr_core::server::Server;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from cloud operations.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The server name is already in use. Callers treat this as *already
    /// handled*: the naming invariant means another worker got there first.
    #[error("server name already taken: {0}")]
    NameTaken(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cloud API error {code}: {message}")]
    Api { code: String, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Request to create one server.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateServerRequest {
    pub name: String,
    pub server_type: String,
    pub location: Option<String>,
    pub image_id: u64,
    pub ssh_key_ids: Vec<u64>,
    pub labels: HashMap<String, String>,
}

/// Adapter for the IaaS provider.
///
/// Implementations are concurrency-safe and internally rate-limited;
/// every call may be issued from any worker.
#[async_trait]
pub trait CloudAdapter: Clone + Send + Sync + 'static {
    /// All servers carrying the controller's ownership labels.
    async fn list_servers(&self) -> Result<Vec<Server>, CloudError>;

    /// One server by cloud id; `None` if it no longer exists.
    async fn get_server(&self, id: u64) -> Result<Option<Server>, CloudError>;

    /// Create a server. Fails with [`CloudError::NameTaken`] when the
    /// name exists, which callers treat as success.
    async fn create_server(&self, req: CreateServerRequest) -> Result<Server, CloudError>;

    async fn delete_server(&self, id: u64) -> Result<(), CloudError>;

    /// Rename a server and replace its labels in one update.
    async fn rename_server(
        &self,
        id: u64,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<Server, CloudError>;

    /// Reimage a server in place.
    async fn rebuild_server(&self, id: u64, image_id: u64) -> Result<(), CloudError>;

    async fn power_off(&self, id: u64) -> Result<(), CloudError>;

    async fn list_server_types(&self) -> Result<Vec<ServerTypeInfo>, CloudError>;
    async fn list_locations(&self) -> Result<Vec<LocationInfo>, CloudError>;
    async fn list_images(&self) -> Result<Vec<ImageInfo>, CloudError>;
    async fn list_ssh_keys(&self) -> Result<Vec<SshKeyInfo>, CloudError>;
    async fn create_ssh_key(&self, name: &str, public_key: &str)
        -> Result<SshKeyInfo, CloudError>;

    /// Hourly price catalog for all server types and locations.
    async fn prices(&self) -> Result<PriceCatalog, CloudError>;
}
