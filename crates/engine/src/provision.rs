// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server provisioning tasks.
//!
//! Each task drives one server through its lifecycle:
//!
//! ```text
//! NEW -> CREATE_SERVER -> WAIT_RUNNING -> BOOTSTRAP_SSH -> RUN_SETUP ->
//! FETCH_RUNNER_TOKEN -> RUN_STARTUP -> DONE
//!                     |
//!                     `- any failure -> MARK_FAILED -> DELETE
//! ```
//!
//! On failure the server is deleted, the mailbox receives a failure
//! event, and the task exits; the job is still queued, so the next tick
//! retries under a fresh name decision.

use crate::deps::EngineDeps;
use crate::error::EngineError;
use crate::metrics;
use crate::worker::InFlightGuard;
use ghr_adapters::{BootstrapAdapter, CiAdapter, CloudAdapter, CloudError, CreateServerRequest};
use ghr_core::server::{
    Server, ServerStatus, LABEL_IMAGE, LABEL_LOCATION, LABEL_PREFIX, LABEL_PROVISIONED_AT,
    LABEL_ROLE, LABEL_RUNNER_LABELS_HASH, LABEL_RUNNER_LABEL_PREFIX, LABEL_SERVER_TYPE,
    LABEL_SSH_KEYS,
};
use ghr_core::{Clock, Event, RunnerSpec, ServerRole, SERVER_NAME_PREFIX};
use std::collections::HashMap;
use std::time::Duration;

/// User the startup script runs as; the setup script is expected to
/// create it.
pub const RUNNER_USER: &str = "ubuntu";
/// Runner group reported to the CI provider.
pub const RUNNER_GROUP: &str = "Default";
/// Cache directory on the server, exported to both scripts.
pub const REMOTE_CACHE_DIR: &str = "/var/cache/ghr";

const WAIT_RUNNING_POLL: Duration = Duration::from_secs(1);

/// Cloud labels for a server provisioned from `spec`.
pub fn server_labels(
    spec: &RunnerSpec,
    role: ServerRole,
    now_secs: u64,
) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    labels.insert(LABEL_ROLE.to_string(), role.to_string());
    labels.insert(LABEL_SERVER_TYPE.to_string(), spec.server_type.clone());
    labels.insert(
        LABEL_LOCATION.to_string(),
        spec.location.clone().unwrap_or_default(),
    );
    labels.insert(LABEL_IMAGE.to_string(), spec.image.to_label());
    labels.insert(LABEL_RUNNER_LABELS_HASH.to_string(), spec.labels_hash());
    labels.insert(LABEL_PREFIX.to_string(), SERVER_NAME_PREFIX.to_string());
    labels.insert(LABEL_SSH_KEYS.to_string(), spec.ssh_keys_hash.clone());
    labels.insert(LABEL_PROVISIONED_AT.to_string(), now_secs.to_string());
    for (i, label) in spec.labels.iter().enumerate() {
        labels.insert(format!("{LABEL_RUNNER_LABEL_PREFIX}{i}"), label.clone());
    }
    labels
}

/// Create a new server and run the bootstrap pipeline.
///
/// A name collision means another worker already owns this name; that
/// is success, not failure.
pub async fn create_server<C, G, B, K>(
    deps: EngineDeps<C, G, B, K>,
    guard: InFlightGuard,
    name: String,
    role: ServerRole,
    spec: RunnerSpec,
) -> Result<(), EngineError>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    let _guard = guard;
    let now_secs = deps.clock.epoch_ms() / 1000;
    let request = CreateServerRequest {
        name: name.clone(),
        server_type: spec.server_type.clone(),
        location: spec.location.clone(),
        image_id: spec.image_id,
        ssh_key_ids: deps.ssh_key_ids.as_ref().clone(),
        labels: server_labels(&spec, role, now_secs),
    };

    let server = match deps.cloud.create_server(request).await {
        Ok(server) => server,
        Err(CloudError::NameTaken(_)) => {
            tracing::debug!(server_name = %name, "name already taken, another worker won the race");
            return Ok(());
        }
        Err(err) => {
            report_failure(&deps, &name, &spec, &err.to_string());
            return Err(err.into());
        }
    };

    tracing::info!(
        server_name = %name,
        server_type = %spec.server_type,
        location = spec.location.as_deref().unwrap_or("any"),
        "created server"
    );
    metrics::inc(&deps.metrics.servers_created);

    finish_provisioning(&deps, server, &spec).await
}

/// Rename a recyclable server onto an active name, reimage it, and run
/// the bootstrap pipeline.
pub async fn rebuild_server<C, G, B, K>(
    deps: EngineDeps<C, G, B, K>,
    guard: InFlightGuard,
    cloud_id: u64,
    from: String,
    to: String,
    spec: RunnerSpec,
) -> Result<(), EngineError>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    let _guard = guard;
    let now_secs = deps.clock.epoch_ms() / 1000;
    let labels = server_labels(&spec, ServerRole::Active, now_secs);

    let server = match deps.cloud.rename_server(cloud_id, &to, labels).await {
        Ok(server) => server,
        Err(CloudError::NameTaken(_)) => {
            tracing::debug!(server_name = %to, "active name already taken, leaving candidate alone");
            return Ok(());
        }
        Err(err) => {
            report_failure(&deps, &to, &spec, &err.to_string());
            return Err(err.into());
        }
    };

    tracing::info!(from = %from, to = %to, "recycling server");
    metrics::inc(&deps.metrics.servers_rebuilt);

    if let Err(err) = deps.cloud.rebuild_server(cloud_id, spec.image_id).await {
        delete_failed(&deps, &server).await;
        report_failure(&deps, &to, &spec, &err.to_string());
        return Err(err.into());
    }

    finish_provisioning(&deps, server, &spec).await
}

/// WAIT_RUNNING through RUN_STARTUP, deleting the server on any failure.
async fn finish_provisioning<C, G, B, K>(
    deps: &EngineDeps<C, G, B, K>,
    server: Server,
    spec: &RunnerSpec,
) -> Result<(), EngineError>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    let name = server.name.clone();
    match bootstrap_pipeline(deps, &server, spec).await {
        Ok(()) => {
            tracing::info!(server_name = %name, "server ready");
            deps.mailbox.send(Event::ServerReady { server_name: name });
            Ok(())
        }
        Err(err) => {
            tracing::warn!(server_name = %name, %err, "provisioning failed, deleting server");
            delete_failed(deps, &server).await;
            report_failure(deps, &name, spec, &err.to_string());
            Err(err)
        }
    }
}

async fn bootstrap_pipeline<C, G, B, K>(
    deps: &EngineDeps<C, G, B, K>,
    server: &Server,
    spec: &RunnerSpec,
) -> Result<(), EngineError>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    let ready_timeout = Duration::from_secs(deps.config.max_server_ready_time);

    let server = wait_running(deps, server, ready_timeout).await?;
    let addr = server
        .public_ipv4
        .ok_or_else(|| EngineError::MissingIpv4(server.name.clone()))?;

    deps.bootstrap.wait_ready(addr, ready_timeout).await?;

    let setup = tokio::fs::read(&spec.setup_script)
        .await
        .map_err(|e| EngineError::Script(format!("{}: {e}", spec.setup_script.display())))?;
    let setup_env = vec![(
        "CACHE_DIR".to_string(),
        REMOTE_CACHE_DIR.to_string(),
    )];
    deps.bootstrap
        .run_script(addr, "root", &setup, &setup_env)
        .await?;

    // Registration tokens are short-lived; fetch just before startup.
    let token = deps.ci.registration_token().await?;

    let startup = tokio::fs::read(&spec.startup_script)
        .await
        .map_err(|e| EngineError::Script(format!("{}: {e}", spec.startup_script.display())))?;
    let startup_env = startup_environment(deps, &server, spec, &token);
    deps.bootstrap
        .run_script(addr, RUNNER_USER, &startup, &startup_env)
        .await?;

    Ok(())
}

fn startup_environment<C, G, B, K>(
    deps: &EngineDeps<C, G, B, K>,
    server: &Server,
    spec: &RunnerSpec,
    token: &str,
) -> Vec<(String, String)>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    let labels: Vec<String> = spec.labels.iter().cloned().collect();
    vec![
        (
            "GITHUB_REPOSITORY".to_string(),
            deps.config.github_repository.clone(),
        ),
        ("GITHUB_RUNNER_TOKEN".to_string(), token.to_string()),
        ("GITHUB_RUNNER_GROUP".to_string(), RUNNER_GROUP.to_string()),
        ("GITHUB_RUNNER_LABELS".to_string(), labels.join(",")),
        ("SERVER_TYPE_NAME".to_string(), server.server_type.clone()),
        ("SERVER_LOCATION_NAME".to_string(), server.location.clone()),
        ("CACHE_DIR".to_string(), REMOTE_CACHE_DIR.to_string()),
    ]
}

async fn wait_running<C, G, B, K>(
    deps: &EngineDeps<C, G, B, K>,
    server: &Server,
    timeout: Duration,
) -> Result<Server, EngineError>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    if server.status == ServerStatus::Running {
        return Ok(server.clone());
    }
    let poll = async {
        loop {
            match deps.cloud.get_server(server.cloud_id).await {
                Ok(Some(current)) if current.status == ServerStatus::Running => {
                    return Ok(current);
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    return Err(EngineError::Cloud(CloudError::NotFound(format!(
                        "server {} disappeared while starting",
                        server.name
                    ))));
                }
                Err(err) => {
                    // Transient listing errors retry until the deadline.
                    tracing::debug!(server_name = %server.name, %err, "get_server failed");
                }
            }
            tokio::time::sleep(WAIT_RUNNING_POLL).await;
        }
    };
    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| EngineError::Timeout(format!("{} did not reach running", server.name)))?
}

async fn delete_failed<C, G, B, K>(deps: &EngineDeps<C, G, B, K>, server: &Server)
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    if let Err(err) = deps.cloud.delete_server(server.cloud_id).await {
        tracing::warn!(server_name = %server.name, %err, "failed to delete failed server");
        return;
    }
    metrics::inc(&deps.metrics.servers_deleted);
    deps.mailbox.send(Event::ServerDeleted {
        server_name: server.name.clone(),
        reason: "provisioning_failed".to_string(),
    });
}

fn report_failure<C, G, B, K>(
    deps: &EngineDeps<C, G, B, K>,
    name: &str,
    spec: &RunnerSpec,
    error: &str,
) where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    metrics::inc(&deps.metrics.scale_up_failures);
    deps.mailbox.send(Event::ScaleUpFailure {
        epoch_ms: deps.clock.epoch_ms(),
        server_name: name.to_string(),
        labels: spec.labels.iter().cloned().collect(),
        error: error.to_string(),
    });
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
