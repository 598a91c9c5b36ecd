// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scale-down loop: reaps powered-off, unused, zombie, and end-of-life
//! servers, then replenishes the standby pools.
//!
//! The loop owns the mailbox reader and drains it each tick; events are
//! hints only, every action re-checks the fresh snapshot.

use crate::deps::EngineDeps;
use crate::error::EngineError;
use crate::labels::derive_spec;
use crate::mailbox::MailboxReader;
use crate::metrics;
use crate::provision;
use crate::state::Snapshot;
use ghr_adapters::{BootstrapAdapter, CiAdapter, CloudAdapter};
use ghr_core::job::{Job, JobStatus};
use ghr_core::server::{Server, ServerStatus, LABEL_ROLE};
use ghr_core::{Clock, Event, RunnerStatus, ServerName, ServerRole};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

/// The scale-down loop.
pub struct ScaleDown<C, G, B, K> {
    deps: EngineDeps<C, G, B, K>,
    reader: MailboxReader,
    /// First tick (epoch ms) each server was observed powered off.
    powered_off_seen: HashMap<String, u64>,
    /// First tick (epoch ms) each runner was observed online and idle.
    unused_seen: HashMap<String, u64>,
    /// Standby groups whose label set was already reported invalid.
    standby_rejected_logged: HashSet<usize>,
}

impl<C, G, B, K> ScaleDown<C, G, B, K>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    pub fn new(deps: EngineDeps<C, G, B, K>, reader: MailboxReader) -> Self {
        Self {
            deps,
            reader,
            powered_off_seen: HashMap::new(),
            unused_seen: HashMap::new(),
            standby_rejected_logged: HashSet::new(),
        }
    }

    pub async fn run(mut self) -> Result<(), EngineError> {
        let interval = Duration::from_secs(self.deps.config.scale_down_interval);
        tracing::info!("scale-down loop started");
        loop {
            if self.deps.terminate.is_set() {
                break;
            }
            if let Err(err) = self.tick().await {
                tracing::warn!(%err, "scale-down cycle failed");
            }
            tokio::select! {
                _ = self.deps.terminate.wait() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("scale-down loop stopped");
        Ok(())
    }

    /// One reaping pass: mailbox, powered-off, unused runners, zombies,
    /// then the standby replenisher.
    pub async fn tick(&mut self) -> Result<(), EngineError> {
        self.drain_mailbox();

        let servers = self.deps.cloud.list_servers().await?;
        let runners = self.deps.ci.list_runners().await?;
        let snapshot = Snapshot::new(servers, runners);
        let mut jobs = self.deps.ci.list_jobs(JobStatus::Queued).await?;
        jobs.extend(self.deps.ci.list_jobs(JobStatus::InProgress).await?);
        let now_ms = self.deps.clock.epoch_ms();

        self.powered_off_pass(&snapshot, now_ms).await;
        self.unused_runner_pass(&snapshot, &jobs, now_ms).await;
        self.zombie_pass(&snapshot, now_ms).await;
        self.standby_replenish(&snapshot, now_ms).await;
        Ok(())
    }

    fn drain_mailbox(&mut self) {
        for event in self.reader.drain() {
            match event {
                Event::ScaleUpFailure {
                    server_name,
                    error,
                    ..
                } => {
                    tracing::warn!(%server_name, %error, "scale-up reported a failure");
                }
                Event::ServerReady { server_name } => {
                    tracing::debug!(%server_name, "server reported ready");
                }
                Event::ServerDeleted {
                    server_name,
                    reason,
                } => {
                    tracing::debug!(%server_name, %reason, "server deleted");
                }
            }
        }
    }

    /// Powered-off pass: delete aged-out servers, or fold them into the
    /// recycle pool while the billing hour still has value.
    async fn powered_off_pass(&mut self, snapshot: &Snapshot, now_ms: u64) {
        let off_now: HashSet<String> = snapshot
            .servers
            .iter()
            .filter(|s| s.status == ServerStatus::Off)
            .map(|s| s.name.clone())
            .collect();
        // Forget servers that are no longer powered off.
        self.powered_off_seen.retain(|name, _| off_now.contains(name));

        let config = self.deps.config.clone();
        for server in snapshot.servers.iter().filter(|s| s.status == ServerStatus::Off) {
            let first_seen = *self
                .powered_off_seen
                .entry(server.name.clone())
                .or_insert(now_ms);
            let minute_in_hour = server.age(now_ms).minute_in_hour();

            if !config.recycle {
                if now_ms.saturating_sub(first_seen) > config.max_powered_off_time * 1000 {
                    self.delete_server(server, "powered_off").await;
                }
                continue;
            }

            if minute_in_hour >= config.end_of_life {
                self.delete_server(server, "end_of_life").await;
                continue;
            }

            if matches!(
                server.role(),
                Some(ServerRole::Active) | Some(ServerRole::Standby)
            ) {
                self.rename_to_recycle(server).await;
            }
        }
    }

    async fn rename_to_recycle(&self, server: &Server) {
        let uid = self.deps.next_uid();
        let new_name = ServerName::recycle(uid).to_string();
        // Preserve every cloud label; only the role changes.
        let mut labels = server.labels.clone();
        labels.insert(LABEL_ROLE.to_string(), ServerRole::Recycle.to_string());

        match self
            .deps
            .cloud
            .rename_server(server.cloud_id, &new_name, labels)
            .await
        {
            Ok(_) => {
                tracing::info!(from = %server.name, to = %new_name, "marked server for recycling");
                metrics::inc(&self.deps.metrics.servers_recycled);
            }
            Err(err) => {
                tracing::warn!(server_name = %server.name, %err, "failed to mark server for recycling");
            }
        }
    }

    /// Unused-runner pass: an idle runner with no name-matching job gets
    /// deregistered and its server deleted. Standby runners within their
    /// configured pool size are exempt.
    async fn unused_runner_pass(&mut self, snapshot: &Snapshot, jobs: &[Job], now_ms: u64) {
        let mut standby_allowance: HashMap<String, usize> = self
            .deps
            .config
            .standby_runners
            .iter()
            .enumerate()
            .map(|(i, g)| (format!("g{i}"), g.count))
            .collect();

        let mut runners: Vec<_> = snapshot.runners.iter().collect();
        runners.sort_by(|a, b| a.name.cmp(&b.name));

        let mut unused_now: HashSet<String> = HashSet::new();
        for runner in runners {
            if !runner.is_unused() {
                continue;
            }
            let Some(parsed) = ServerName::parse(&runner.name) else {
                continue;
            };
            match &parsed {
                ServerName::Standby { group, .. } => {
                    if let Some(allowance) = standby_allowance.get_mut(group) {
                        if *allowance > 0 {
                            *allowance -= 1;
                            continue;
                        }
                    }
                }
                ServerName::Active { run_id, job_id } => {
                    if jobs.iter().any(|j| j.identity() == (*run_id, *job_id)) {
                        continue;
                    }
                }
                ServerName::Recycle { .. } => {}
            }
            unused_now.insert(runner.name.clone());
        }
        self.unused_seen.retain(|name, _| unused_now.contains(name));

        for name in unused_now {
            let first_seen = *self.unused_seen.entry(name.clone()).or_insert(now_ms);
            if now_ms.saturating_sub(first_seen)
                <= self.deps.config.max_unused_runner_time * 1000
            {
                continue;
            }
            if let Some(server) = snapshot.server(&name) {
                self.delete_server(server, "unused_runner").await;
            }
            if let Some(runner) = snapshot.runner_for(&name) {
                match self.deps.ci.remove_runner(runner.id).await {
                    Ok(()) => {
                        tracing::info!(runner_name = %name, "deregistered unused runner");
                    }
                    Err(err) => {
                        tracing::warn!(runner_name = %name, %err, "failed to deregister runner");
                    }
                }
            }
            self.unused_seen.remove(&name);
        }
    }

    /// Zombie pass: a running active server whose runner never appeared.
    async fn zombie_pass(&mut self, snapshot: &Snapshot, now_ms: u64) {
        let deadline_secs = self.deps.config.max_runner_registration_time;
        let now_secs = now_ms / 1000;

        let zombies: Vec<&Server> = snapshot
            .servers
            .iter()
            .filter(|s| s.role() == Some(ServerRole::Active))
            .filter(|s| s.status == ServerStatus::Running)
            .filter(|s| snapshot.runner_for(&s.name).is_none())
            // Bootstrap still in flight: registration is not overdue yet.
            .filter(|s| !self.deps.in_flight.contains(&s.name))
            .filter(|s| now_secs.saturating_sub(s.provisioned_at_secs()) > deadline_secs)
            .collect();

        for server in zombies {
            self.delete_server(server, "zombie").await;
        }
    }

    /// Standby replenisher: keep each group at its configured size.
    async fn standby_replenish(&mut self, snapshot: &Snapshot, now_ms: u64) {
        let config = self.deps.config.clone();
        let now_secs = now_ms / 1000;

        for (index, group) in config.standby_runners.iter().enumerate() {
            if self.deps.terminate.is_set() {
                return;
            }
            let group_name = format!("g{index}");
            let prefix = ServerName::standby_prefix(&group_name);

            let mut current = 0;
            for server in snapshot.servers.iter().filter(|s| s.name.starts_with(&prefix)) {
                match snapshot.runner_for(&server.name) {
                    Some(runner) if runner.status == RunnerStatus::Online => {
                        if !runner.busy || !group.replenish_immediately {
                            current += 1;
                        }
                    }
                    _ => {
                        // Still registering counts as filled, otherwise every
                        // tick would double-provision the pool.
                        let age = now_secs.saturating_sub(server.provisioned_at_secs());
                        if age <= config.max_runner_registration_time {
                            current += 1;
                        }
                    }
                }
            }
            current += self
                .deps
                .in_flight
                .entries()
                .iter()
                .filter(|(name, _)| name.starts_with(&prefix))
                .count();

            if current >= group.count {
                continue;
            }

            let labels: BTreeSet<String> =
                group.labels.iter().map(|l| l.to_lowercase()).collect();
            let spec = match derive_spec(
                &labels,
                &config,
                &self.deps.catalog,
                &self.deps.ssh_keys_hash,
            ) {
                Ok(spec) => spec,
                Err(err) => {
                    if self.standby_rejected_logged.insert(index) {
                        tracing::warn!(group = %group_name, %err, "standby group labels rejected");
                    }
                    continue;
                }
            };

            for _ in current..group.count {
                if self.deps.terminate.is_set() {
                    return;
                }
                let owned = snapshot.owned_count() + self.deps.in_flight.len();
                if owned >= config.max_runners {
                    tracing::debug!(group = %group_name, "standby replenish deferred, global cap reached");
                    break;
                }
                let name = ServerName::standby(&group_name, self.deps.next_uid()).to_string();
                let Some(guard) = self.deps.in_flight.insert(&name, spec.labels.clone()) else {
                    continue;
                };
                tracing::info!(group = %group_name, server_name = %name, "replenishing standby pool");
                let deps = self.deps.clone();
                let deadline = crate::scale_up::task_deadline(&config);
                let handle = self
                    .deps
                    .pool
                    .spawn_with_deadline(
                        deadline,
                        provision::create_server(deps, guard, name, ServerRole::Standby, spec.clone()),
                    )
                    .await;
                drop(handle);
            }
        }
    }

    async fn delete_server(&self, server: &Server, reason: &str) {
        match self.deps.cloud.delete_server(server.cloud_id).await {
            Ok(()) => {
                tracing::info!(server_name = %server.name, reason, "deleted server");
                metrics::inc(&self.deps.metrics.servers_deleted);
                self.deps.mailbox.send(Event::ServerDeleted {
                    server_name: server.name.clone(),
                    reason: reason.to_string(),
                });
            }
            Err(err) => {
                tracing::warn!(server_name = %server.name, reason, %err, "failed to delete server");
            }
        }
    }
}

#[cfg(test)]
#[path = "scale_down_tests.rs"]
mod tests;
