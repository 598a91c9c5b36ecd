// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake cloud adapter for testing

use super::{CloudAdapter, CloudError, CreateServerRequest};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ghr_core::catalog::{
    Arch, ImageInfo, ImageKind, LocationInfo, PriceCatalog, ServerTypeInfo, SshKeyInfo,
};
use ghr_core::server::{Server, ServerStatus, LABEL_IMAGE};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Recorded mutating cloud call.
#[derive(Debug, Clone, PartialEq)]
pub enum CloudCall {
    Create { name: String },
    Delete { id: u64, name: String },
    Rename { id: u64, from: String, to: String },
    Rebuild { id: u64, image_id: u64 },
    PowerOff { id: u64 },
    CreateSshKey { name: String },
}

struct FakeCloudState {
    servers: HashMap<u64, Server>,
    server_types: Vec<ServerTypeInfo>,
    locations: Vec<LocationInfo>,
    images: Vec<ImageInfo>,
    ssh_keys: Vec<SshKeyInfo>,
    prices: PriceCatalog,
    calls: Vec<CloudCall>,
    next_id: u64,
    epoch_ms: u64,
    create_status: ServerStatus,
    fail_creates: bool,
}

/// Fake cloud with a programmable inventory and recorded calls.
#[derive(Clone)]
pub struct FakeCloud {
    inner: Arc<Mutex<FakeCloudState>>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeCloudState {
                servers: HashMap::new(),
                server_types: vec![
                    ServerTypeInfo {
                        id: 1,
                        name: "cx22".to_string(),
                        architecture: Arch::X86,
                    },
                    ServerTypeInfo {
                        id: 2,
                        name: "cpx21".to_string(),
                        architecture: Arch::X86,
                    },
                    ServerTypeInfo {
                        id: 3,
                        name: "cax21".to_string(),
                        architecture: Arch::Arm,
                    },
                ],
                locations: vec![
                    LocationInfo {
                        id: 1,
                        name: "fsn1".to_string(),
                    },
                    LocationInfo {
                        id: 2,
                        name: "ash".to_string(),
                    },
                ],
                images: vec![
                    ImageInfo {
                        id: 10,
                        kind: ImageKind::System,
                        architecture: Arch::X86,
                        name: Some("ubuntu-22.04".to_string()),
                        description: "Ubuntu 22.04".to_string(),
                    },
                    ImageInfo {
                        id: 11,
                        kind: ImageKind::System,
                        architecture: Arch::Arm,
                        name: Some("ubuntu-22.04".to_string()),
                        description: "Ubuntu 22.04".to_string(),
                    },
                ],
                ssh_keys: vec![SshKeyInfo {
                    id: 100,
                    name: "ci-key".to_string(),
                    fingerprint: "aa:bb".to_string(),
                }],
                prices: PriceCatalog::new(),
                calls: Vec::new(),
                next_id: 1000,
                epoch_ms: 0,
                create_status: ServerStatus::Running,
                fail_creates: false,
            })),
        }
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wall-clock used for `created_at` of new servers.
    pub fn set_epoch_ms(&self, epoch_ms: u64) {
        self.inner.lock().epoch_ms = epoch_ms;
    }

    /// Status newly created servers report (default `Running`).
    pub fn set_create_status(&self, status: ServerStatus) {
        self.inner.lock().create_status = status;
    }

    /// Make subsequent `create_server` calls fail with an API error.
    pub fn set_fail_creates(&self, fail: bool) {
        self.inner.lock().fail_creates = fail;
    }

    pub fn set_prices(&self, prices: PriceCatalog) {
        self.inner.lock().prices = prices;
    }

    /// Seed a server; returns its cloud id.
    pub fn add_server(
        &self,
        name: &str,
        status: ServerStatus,
        server_type: &str,
        location: &str,
        created_at_secs: i64,
        labels: HashMap<String, String>,
    ) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let image = labels.get(LABEL_IMAGE).cloned().unwrap_or_default();
        inner.servers.insert(
            id,
            Server {
                cloud_id: id,
                name: name.to_string(),
                status,
                server_type: server_type.to_string(),
                location: location.to_string(),
                image,
                public_ipv4: Some(Ipv4Addr::new(10, 0, (id / 256) as u8, (id % 256) as u8)),
                created_at: timestamp(created_at_secs),
                labels,
            },
        );
        id
    }

    pub fn set_server_status(&self, id: u64, status: ServerStatus) {
        if let Some(server) = self.inner.lock().servers.get_mut(&id) {
            server.status = status;
        }
    }

    pub fn server_by_name(&self, name: &str) -> Option<Server> {
        self.inner
            .lock()
            .servers
            .values()
            .find(|s| s.name == name)
            .cloned()
    }

    pub fn servers(&self) -> Vec<Server> {
        let mut servers: Vec<Server> = self.inner.lock().servers.values().cloned().collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.inner.lock().calls.clone()
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

#[async_trait]
impl CloudAdapter for FakeCloud {
    async fn list_servers(&self) -> Result<Vec<Server>, CloudError> {
        Ok(self.servers())
    }

    async fn get_server(&self, id: u64) -> Result<Option<Server>, CloudError> {
        Ok(self.inner.lock().servers.get(&id).cloned())
    }

    async fn create_server(&self, req: CreateServerRequest) -> Result<Server, CloudError> {
        let mut inner = self.inner.lock();

        inner.calls.push(CloudCall::Create {
            name: req.name.clone(),
        });

        if inner.fail_creates {
            return Err(CloudError::Api {
                code: "resource_limit_exceeded".to_string(),
                message: "project limit reached".to_string(),
            });
        }
        if inner.servers.values().any(|s| s.name == req.name) {
            return Err(CloudError::NameTaken(req.name));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let created_at = timestamp((inner.epoch_ms / 1000) as i64);
        let image = req.labels.get(LABEL_IMAGE).cloned().unwrap_or_default();
        let server = Server {
            cloud_id: id,
            name: req.name,
            status: inner.create_status,
            server_type: req.server_type,
            location: req.location.unwrap_or_else(|| "fsn1".to_string()),
            image,
            public_ipv4: Some(Ipv4Addr::new(10, 0, (id / 256) as u8, (id % 256) as u8)),
            created_at,
            labels: req.labels,
        };
        inner.servers.insert(id, server.clone());
        Ok(server)
    }

    async fn delete_server(&self, id: u64) -> Result<(), CloudError> {
        let mut inner = self.inner.lock();
        let name = match inner.servers.remove(&id) {
            Some(server) => server.name,
            None => return Err(CloudError::NotFound(format!("server {id}"))),
        };
        inner.calls.push(CloudCall::Delete { id, name });
        Ok(())
    }

    async fn rename_server(
        &self,
        id: u64,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<Server, CloudError> {
        let mut inner = self.inner.lock();

        if inner.servers.values().any(|s| s.cloud_id != id && s.name == name) {
            return Err(CloudError::NameTaken(name.to_string()));
        }

        let server = inner
            .servers
            .get(&id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("server {id}")))?;
        let from = server.name.clone();

        let image = labels
            .get(LABEL_IMAGE)
            .cloned()
            .unwrap_or_else(|| server.image.clone());
        let updated = Server {
            name: name.to_string(),
            labels,
            image,
            ..server
        };
        inner.servers.insert(id, updated.clone());
        inner.calls.push(CloudCall::Rename {
            id,
            from,
            to: name.to_string(),
        });
        Ok(updated)
    }

    async fn rebuild_server(&self, id: u64, image_id: u64) -> Result<(), CloudError> {
        let mut inner = self.inner.lock();
        if !inner.servers.contains_key(&id) {
            return Err(CloudError::NotFound(format!("server {id}")));
        }
        if let Some(server) = inner.servers.get_mut(&id) {
            server.status = ServerStatus::Running;
        }
        inner.calls.push(CloudCall::Rebuild { id, image_id });
        Ok(())
    }

    async fn power_off(&self, id: u64) -> Result<(), CloudError> {
        let mut inner = self.inner.lock();
        if let Some(server) = inner.servers.get_mut(&id) {
            server.status = ServerStatus::Off;
        }
        inner.calls.push(CloudCall::PowerOff { id });
        Ok(())
    }

    async fn list_server_types(&self) -> Result<Vec<ServerTypeInfo>, CloudError> {
        Ok(self.inner.lock().server_types.clone())
    }

    async fn list_locations(&self) -> Result<Vec<LocationInfo>, CloudError> {
        Ok(self.inner.lock().locations.clone())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, CloudError> {
        Ok(self.inner.lock().images.clone())
    }

    async fn list_ssh_keys(&self) -> Result<Vec<SshKeyInfo>, CloudError> {
        Ok(self.inner.lock().ssh_keys.clone())
    }

    async fn create_ssh_key(
        &self,
        name: &str,
        public_key: &str,
    ) -> Result<SshKeyInfo, CloudError> {
        let mut inner = self.inner.lock();
        let id = 100 + inner.ssh_keys.len() as u64;
        let key = SshKeyInfo {
            id,
            name: name.to_string(),
            fingerprint: format!("fp:{}", public_key.len()),
        };
        inner.ssh_keys.push(key.clone());
        inner.calls.push(CloudCall::CreateSshKey {
            name: name.to_string(),
        });
        Ok(key)
    }

    async fn prices(&self) -> Result<PriceCatalog, CloudError> {
        Ok(self.inner.lock().prices.clone())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
