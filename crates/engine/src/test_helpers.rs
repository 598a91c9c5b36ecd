// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::api_watch::{gauge_channel, ApiGauge};
use crate::deps::EngineDeps;
use crate::labels::derive_spec;
use crate::mailbox::{Mailbox, MailboxReader};
use crate::metrics::Metrics;
use crate::shutdown::Terminate;
use crate::worker::{InFlight, WorkerPool};
use chrono::{TimeZone, Utc};
use ghr_adapters::{FakeBootstrap, FakeCi, FakeCloud};
use ghr_config::Config;
use ghr_core::catalog::{Arch, Catalog, ImageInfo, ImageKind, LocationInfo, PriceCatalog, ServerTypeInfo};
use ghr_core::job::{Job, JobStatus};
use ghr_core::runner::{Runner, RunnerStatus};
use ghr_core::server::{Server, ServerStatus};
use ghr_core::{ssh_keys_hash, FakeClock, RunnerSpec, UidGen};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

pub fn labels(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

pub fn catalog() -> Catalog {
    Catalog {
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
            ImageInfo {
                id: 12,
                kind: ImageKind::Snapshot,
                architecture: Arch::X86,
                name: None,
                description: "ci-base".to_string(),
            },
        ],
    }
}

/// Scripts directory with the default setup and per-arch startup files.
pub fn scripts_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for file in ["setup.sh", "startup-x86.sh", "startup-arm.sh", "setup-docker.sh"] {
        std::fs::write(dir.path().join(file), "#!/bin/bash\ntrue\n").expect("write script");
    }
    dir
}

pub fn config(scripts: &Path) -> Config {
    let mut config = Config::default();
    config.github_token = "test-token".to_string();
    config.github_repository = "acme/widgets".to_string();
    config.hetzner_token = "test-token".to_string();
    config.scripts = Some(scripts.to_path_buf());
    config
}

pub fn job(run_id: u64, job_id: u64, label_set: &[&str]) -> Job {
    Job::new(run_id, job_id, JobStatus::Queued, labels(label_set))
}

pub fn runner(id: u64, name: &str, status: RunnerStatus, busy: bool, label_set: &[&str]) -> Runner {
    Runner {
        id,
        name: name.to_string(),
        status,
        busy,
        labels: labels(label_set),
    }
}

/// Everything the loop tests need, wired over the fake adapters.
pub struct TestRig {
    pub cloud: FakeCloud,
    pub ci: FakeCi,
    pub bootstrap: FakeBootstrap,
    pub clock: FakeClock,
    pub scripts: TempDir,
    pub deps: EngineDeps<FakeCloud, FakeCi, FakeBootstrap, FakeClock>,
    pub reader: Option<MailboxReader>,
    pub gauge_tx: watch::Sender<ApiGauge>,
}

pub const RIG_EPOCH_MS: u64 = 1_700_000_000_000;

pub fn rig() -> TestRig {
    rig_with(|_| {})
}

/// Build a rig, letting the caller adjust the config first.
pub fn rig_with(adjust: impl FnOnce(&mut Config)) -> TestRig {
    let scripts = scripts_dir();
    let mut cfg = config(scripts.path());
    adjust(&mut cfg);

    let cloud = FakeCloud::new();
    cloud.set_epoch_ms(RIG_EPOCH_MS);
    let ci = FakeCi::new();
    let bootstrap = FakeBootstrap::new();
    let clock = FakeClock::at_epoch_ms(RIG_EPOCH_MS);
    let (mailbox, reader) = Mailbox::new();
    let (gauge_tx, api_gauge) = gauge_channel();

    let ssh_key_ids = vec![100u64];
    let deps = EngineDeps {
        cloud: cloud.clone(),
        ci: ci.clone(),
        bootstrap: bootstrap.clone(),
        clock: clock.clone(),
        config: Arc::new(cfg),
        catalog: Arc::new(catalog()),
        prices: Arc::new(PriceCatalog::new()),
        ssh_keys_hash: ssh_keys_hash(&ssh_key_ids),
        ssh_key_ids: Arc::new(ssh_key_ids),
        pool: WorkerPool::new(4),
        in_flight: InFlight::new(),
        mailbox,
        metrics: Arc::new(Metrics::new()),
        terminate: Terminate::new(),
        uid_gen: UidGen::new(),
        api_gauge,
    };

    TestRig {
        cloud,
        ci,
        bootstrap,
        clock,
        scripts,
        deps,
        reader: Some(reader),
        gauge_tx,
    }
}

impl TestRig {
    /// Derive a spec exactly the way the loops do.
    pub fn spec(&self, label_set: &[&str]) -> RunnerSpec {
        derive_spec(
            &labels(label_set),
            &self.deps.config,
            &self.deps.catalog,
            &self.deps.ssh_keys_hash,
        )
        .expect("spec derivation")
    }

    /// Seed an owned server carrying the full label set a provisioned
    /// server would have.
    pub fn seed_server(
        &self,
        name: &str,
        status: ServerStatus,
        role: ghr_core::ServerRole,
        label_set: &[&str],
        created_at_secs: i64,
    ) -> u64 {
        let spec = self.spec(label_set);
        let cloud_labels =
            crate::provision::server_labels(&spec, role, created_at_secs.max(0) as u64);
        self.cloud.add_server(
            name,
            status,
            &spec.server_type,
            spec.location.as_deref().unwrap_or("fsn1"),
            created_at_secs,
            cloud_labels,
        )
    }

    /// Wait for every in-flight provisioning task to finish.
    pub async fn settle(&self) {
        for _ in 0..200 {
            if self.deps.in_flight.is_empty() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("in-flight tasks did not settle");
    }
}

pub fn server(
    name: &str,
    status: ServerStatus,
    server_type: &str,
    location: &str,
    created_at_secs: i64,
) -> Server {
    Server {
        cloud_id: 1,
        name: name.to_string(),
        status,
        server_type: server_type.to_string(),
        location: location.to_string(),
        image: "x86-system-ubuntu-22.04".to_string(),
        public_ipv4: Some("10.0.0.1".parse().expect("addr")),
        created_at: Utc.timestamp_opt(created_at_secs, 0).single().expect("timestamp"),
        labels: Default::default(),
    }
}
