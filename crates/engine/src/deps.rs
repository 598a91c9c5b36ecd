// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared dependencies handed to every loop and provisioning task.

use crate::api_watch::ApiGauge;
use crate::mailbox::Mailbox;
use crate::metrics::Metrics;
use crate::shutdown::Terminate;
use crate::worker::{InFlight, WorkerPool};
use ghr_adapters::{BootstrapAdapter, CiAdapter, CloudAdapter};
use ghr_config::Config;
use ghr_core::catalog::{Catalog, PriceCatalog};
use ghr_core::{Clock, UidGen};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything a loop needs. Cheap to clone; the adapters are internally
/// shared and concurrency-safe.
#[derive(Clone)]
pub struct EngineDeps<C, G, B, K> {
    pub cloud: C,
    pub ci: G,
    pub bootstrap: B,
    pub clock: K,
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub prices: Arc<PriceCatalog>,
    /// Cloud ids of the controller's SSH keys, installed on every server.
    pub ssh_key_ids: Arc<Vec<u64>>,
    /// Hash of `ssh_key_ids`, part of every fingerprint.
    pub ssh_keys_hash: String,
    pub pool: WorkerPool,
    pub in_flight: InFlight,
    pub mailbox: Mailbox,
    pub metrics: Arc<Metrics>,
    pub terminate: Terminate,
    pub uid_gen: UidGen,
    pub api_gauge: watch::Receiver<ApiGauge>,
}

impl<C, G, B, K> EngineDeps<C, G, B, K>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    /// Fresh uid from the shared generator.
    pub fn next_uid(&self) -> String {
        self.uid_gen.next(&self.clock)
    }
}
