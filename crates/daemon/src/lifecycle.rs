// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, the three loops, bounded shutdown.

use fs2::FileExt;
use ghr_adapters::{CloudAdapter, GithubCi, HetznerCloud, SshBootstrap};
use ghr_config::Config;
use ghr_core::catalog::Catalog;
use ghr_core::{ssh_keys_hash, SystemClock, UidGen};
use ghr_engine::api_watch::gauge_channel;
use ghr_engine::{
    ApiWatch, EngineDeps, InFlight, Mailbox, Metrics, ScaleDown, ScaleUp, Terminate, WorkerPool,
};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Errors that prevent the daemon from starting.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("config error: {0}")]
    Config(#[from] ghr_config::ConfigError),
    #[error("another instance is already running (lock: {0})")]
    LockFailed(PathBuf),
    #[error("cannot read SSH public key {path}: {source}")]
    SshKeyRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cloud error during startup: {0}")]
    Cloud(#[from] ghr_adapters::CloudError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started daemon: loop handles plus the shared terminate signal.
pub struct Started {
    pub terminate: Terminate,
    pub handles: Vec<JoinHandle<()>>,
    // NOTE(lifetime): held to maintain the exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

/// Acquire the exclusive lock file so only one controller manages the
/// project's servers.
fn acquire_lock(config: &Config) -> Result<File, LifecycleError> {
    let lock_path = config.cache_dir.join("ghrd.lock");
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(lock_path))?;
    Ok(file)
}

/// Content-derived cloud name for an uploaded public key, so re-runs
/// find their earlier uploads.
fn key_name(public_key: &str) -> String {
    let content: BTreeSet<String> = [public_key.to_string()].into();
    format!("ghr-{}", ghr_core::labels_hash(&content))
}

/// Make sure every configured SSH public key exists cloud-side, creating
/// missing ones. Returns the cloud key ids, primary first.
async fn ensure_ssh_keys(
    cloud: &HetznerCloud,
    config: &Config,
) -> Result<Vec<u64>, LifecycleError> {
    let existing = cloud.list_ssh_keys().await?;
    let mut ids = Vec::new();

    for path in config.ssh_key_paths() {
        let public_key = std::fs::read_to_string(&path)
            .map_err(|source| LifecycleError::SshKeyRead {
                path: path.clone(),
                source,
            })?
            .trim()
            .to_string();

        let name = key_name(&public_key);
        if let Some(found) = existing.iter().find(|k| k.name == name) {
            ids.push(found.id);
            continue;
        }
        let created = cloud.create_ssh_key(&name, &public_key).await?;
        info!(key_name = %created.name, "uploaded SSH key");
        ids.push(created.id);
    }
    Ok(ids)
}

/// Build adapters, fetch catalogs, and spawn the three loops.
pub async fn startup(config: Config) -> Result<Started, LifecycleError> {
    let lock_file = acquire_lock(&config)?;

    let cloud = HetznerCloud::new(&config.hetzner_token);
    let ci = GithubCi::new(
        &config.github_token,
        &config.github_repository,
        config.cache_dir.join("http"),
    );
    let bootstrap = SshBootstrap::new();
    let clock = SystemClock::new();

    info!("fetching cloud catalogs");
    let catalog = Catalog {
        server_types: cloud.list_server_types().await?,
        locations: cloud.list_locations().await?,
        images: cloud.list_images().await?,
    };
    let prices = cloud.prices().await?;
    if prices.is_empty() {
        warn!("price catalog is empty; eviction will fall back to age ordering");
    }

    let ssh_key_ids = ensure_ssh_keys(&cloud, &config).await?;
    info!(keys = ssh_key_ids.len(), "SSH keys ready");

    let (mailbox, reader) = Mailbox::new();
    let (gauge_tx, api_gauge) = gauge_channel();
    let terminate = Terminate::new();
    let config = Arc::new(config);

    let deps = EngineDeps {
        cloud,
        ci: ci.clone(),
        bootstrap,
        clock: clock.clone(),
        config: Arc::clone(&config),
        catalog: Arc::new(catalog),
        prices: Arc::new(prices),
        ssh_keys_hash: ssh_keys_hash(&ssh_key_ids),
        ssh_key_ids: Arc::new(ssh_key_ids),
        pool: WorkerPool::new(config.workers),
        in_flight: InFlight::new(),
        mailbox,
        metrics: Arc::new(Metrics::new()),
        terminate: terminate.clone(),
        uid_gen: UidGen::new(),
        api_gauge,
    };

    // The three system loops, siblings of the worker pool.
    let scale_up = ScaleUp::new(deps.clone());
    let scale_down = ScaleDown::new(deps.clone(), reader);
    let api_watch = ApiWatch::new(ci, clock, gauge_tx, terminate.clone());

    let terminate_up = terminate.clone();
    let terminate_down = terminate.clone();
    let handles = vec![
        tokio::spawn(async move {
            if let Err(err) = scale_up.run().await {
                tracing::error!(%err, "scale-up loop failed");
                terminate_up.set();
            }
        }),
        tokio::spawn(async move {
            if let Err(err) = scale_down.run().await {
                tracing::error!(%err, "scale-down loop failed");
                terminate_down.set();
            }
        }),
        tokio::spawn(api_watch.run()),
    ];

    Ok(Started {
        terminate,
        handles,
        lock_file,
    })
}

/// Wait for the loops to stop, bounded by `terminate_timeout`. Tasks
/// exceeding the bound are orphaned; the process exits anyway.
pub async fn shutdown(started: Started, terminate_timeout: u64) {
    let drain = async {
        for handle in started.handles {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(terminate_timeout), drain)
        .await
        .is_err()
    {
        warn!("shutdown timed out, orphaning outstanding tasks");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
