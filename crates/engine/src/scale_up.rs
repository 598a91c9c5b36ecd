// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scale-up loop: one server per queued job.
//!
//! Each tick derives a plan from a fresh snapshot, then executes it.
//! Planning is a pure function of the inputs, so re-planning the same
//! frozen state yields the same decisions; dispatch goes through the
//! worker pool and the in-flight registry, which linearizes work per
//! server name across ticks.

use crate::deps::EngineDeps;
use crate::error::EngineError;
use crate::labels::derive_spec;
use crate::metrics;
use crate::provision;
use crate::recycle::{server_matches_spec, RecyclePool};
use crate::state::Snapshot;
use ghr_adapters::{BootstrapAdapter, CiAdapter, CloudAdapter, CloudError};
use ghr_config::Config;
use ghr_core::catalog::{Catalog, PriceCatalog};
use ghr_core::job::{Job, JobStatus};
use ghr_core::{Clock, Event, RunnerSpec, RunnerStatus, ServerName, ServerRole};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

/// Warn when the remaining API budget drops below this many calls.
const API_BUDGET_LOW_WATERMARK: u64 = 100;

/// Wall-clock allowance for the setup and startup scripts, on top of the
/// configured ready timeouts, before the pool abandons a task.
pub(crate) const SCRIPT_ALLOWANCE: Duration = Duration::from_secs(15 * 60);

/// Overall deadline for one provisioning task.
pub(crate) fn task_deadline(config: &Config) -> Duration {
    Duration::from_secs(2 * config.max_server_ready_time) + SCRIPT_ALLOWANCE
}

/// Why a queued job gets no server this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// A server with the deterministic name already exists or is being
    /// created.
    AlreadyPresent,
    /// A required `with_label` entry is missing.
    MissingLabel(String),
    /// The workflow run already has its maximum number of servers.
    WorkflowRunCap,
    /// A per-label-set cap is exhausted.
    LabelCap(Vec<String>),
    /// The global cap is reached and neither recycling nor eviction
    /// could free a slot.
    MaxRunners,
    /// The label set does not resolve to a valid spec.
    SpecRejected(String),
}

/// One planned action for one queued job.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    CreateNew {
        name: String,
        spec: RunnerSpec,
    },
    /// Rename a matching recyclable onto the active name and reimage it.
    Rebuild {
        cloud_id: u64,
        from: String,
        to: String,
        spec: RunnerSpec,
    },
    /// Rename an idle standby onto the active name; no new server.
    Promote {
        cloud_id: u64,
        from: String,
        to: String,
        spec: RunnerSpec,
    },
    /// Delete the victim to free a slot, then create.
    EvictThenCreate {
        victim_id: u64,
        victim_name: String,
        name: String,
        spec: RunnerSpec,
    },
    Skip {
        name: String,
        job: (u64, u64),
        reason: SkipReason,
    },
}

/// Inputs to one planning pass. All references: planning never mutates
/// observed state.
pub struct PlanInput<'a> {
    pub jobs: &'a [Job],
    pub snapshot: &'a Snapshot,
    /// Names and labels of provisioning tasks still in flight.
    pub pending: &'a [(String, BTreeSet<String>)],
    pub config: &'a Config,
    pub catalog: &'a Catalog,
    pub prices: &'a PriceCatalog,
    pub ssh_keys_hash: &'a str,
}

/// Running totals over snapshot + pending + this tick's decisions.
struct Tally<'a> {
    input: &'a PlanInput<'a>,
    planned: Vec<(String, BTreeSet<String>)>,
    removed: Vec<String>,
}

impl<'a> Tally<'a> {
    fn new(input: &'a PlanInput<'a>) -> Self {
        Self {
            input,
            planned: Vec::new(),
            removed: Vec::new(),
        }
    }

    fn has(&self, name: &str) -> bool {
        (self.input.snapshot.has_server(name) && !self.removed.iter().any(|r| r == name))
            || self.input.pending.iter().any(|(n, _)| n == name)
            || self.planned.iter().any(|(n, _)| n == name)
    }

    fn total(&self) -> usize {
        self.input.snapshot.owned_count() + self.input.pending.len() + self.planned.len()
            - self.removed.len()
    }

    fn with_labels(&self, labels: &BTreeSet<String>) -> usize {
        let superset = |set: &BTreeSet<String>| labels.iter().all(|l| set.contains(l));
        let snapshot = self
            .input
            .snapshot
            .servers
            .iter()
            .filter(|s| !self.removed.iter().any(|r| r == &s.name))
            .filter(|s| superset(&s.runner_labels()))
            .count();
        let pending = self
            .input
            .pending
            .iter()
            .filter(|(_, l)| superset(l))
            .count();
        let planned = self.planned.iter().filter(|(_, l)| superset(l)).count();
        snapshot + pending + planned
    }

    fn in_run(&self, run_id: u64) -> usize {
        let prefix = ServerName::run_prefix(run_id);
        let snapshot = self
            .input
            .snapshot
            .servers
            .iter()
            .filter(|s| !self.removed.iter().any(|r| r == &s.name))
            .filter(|s| s.name.starts_with(&prefix))
            .count();
        let extra = self
            .input
            .pending
            .iter()
            .map(|(n, _)| n)
            .chain(self.planned.iter().map(|(n, _)| n))
            .filter(|n| n.starts_with(&prefix))
            .count();
        snapshot + extra
    }

    fn add(&mut self, name: &str, labels: &BTreeSet<String>) {
        self.planned.push((name.to_string(), labels.clone()));
    }

    fn remove(&mut self, name: &str) {
        self.removed.push(name.to_string());
    }
}

/// Plan one scale-up tick. Deterministic given the same inputs; consumes
/// pool candidates as it assigns them.
pub fn plan(input: &PlanInput<'_>, pool: &mut RecyclePool) -> Vec<Decision> {
    let mut decisions = Vec::new();
    let mut tally = Tally::new(input);
    let mut evicted_this_tick = false;
    let with_label = input.config.with_label_lower();

    for job in input.jobs {
        if job.status != JobStatus::Queued {
            continue;
        }
        let name = job.server_name().to_string();
        let identity = job.identity();
        let skip = |reason: SkipReason| Decision::Skip {
            name: job.server_name().to_string(),
            job: identity,
            reason,
        };

        if let Some(missing) = with_label.iter().find(|l| !job.labels.contains(*l)) {
            decisions.push(skip(SkipReason::MissingLabel(missing.clone())));
            continue;
        }
        if tally.has(&name) {
            decisions.push(skip(SkipReason::AlreadyPresent));
            continue;
        }
        if let Some(cap) = input.config.max_runners_in_workflow_run {
            if tally.in_run(job.run_id) >= cap {
                decisions.push(skip(SkipReason::WorkflowRunCap));
                continue;
            }
        }

        let spec = match derive_spec(
            &job.labels,
            input.config,
            input.catalog,
            input.ssh_keys_hash,
        ) {
            Ok(spec) => spec,
            Err(err) => {
                decisions.push(skip(SkipReason::SpecRejected(err.to_string())));
                continue;
            }
        };

        if let Some(cap) = input
            .config
            .max_runners_for_label
            .iter()
            .find(|cap| {
                let wanted: BTreeSet<String> =
                    cap.labels.iter().map(|l| l.to_lowercase()).collect();
                wanted.iter().all(|l| spec.labels.contains(l))
                    && tally.with_labels(&wanted) >= cap.max
            })
        {
            decisions.push(skip(SkipReason::LabelCap(cap.labels.clone())));
            continue;
        }

        // Standby promotion: a warm matching runner takes the job
        // without any new server.
        if let Some(standby) = find_idle_standby(input.snapshot, &tally, job, &spec) {
            let from = standby.0;
            tally.remove(&from);
            tally.add(&name, &spec.labels);
            decisions.push(Decision::Promote {
                cloud_id: standby.1,
                from,
                to: name,
                spec,
            });
            continue;
        }

        if tally.total() < input.config.max_runners {
            tally.add(&name, &spec.labels);
            decisions.push(Decision::CreateNew { name, spec });
            continue;
        }

        if let Some(candidate) = pool.take_match(&spec) {
            tally.remove(&candidate.name);
            tally.add(&name, &spec.labels);
            decisions.push(Decision::Rebuild {
                cloud_id: candidate.cloud_id,
                from: candidate.name,
                to: name,
                spec,
            });
            continue;
        }

        if !evicted_this_tick {
            if let Some(victim) =
                pool.take_victim(input.config.delete_random, input.prices)
            {
                evicted_this_tick = true;
                tally.remove(&victim.name);
                tally.add(&name, &spec.labels);
                decisions.push(Decision::EvictThenCreate {
                    victim_id: victim.cloud_id,
                    victim_name: victim.name,
                    name,
                    spec,
                });
                continue;
            }
        }

        decisions.push(skip(SkipReason::MaxRunners));
    }
    decisions
}

/// Oldest-named idle standby whose labels cover the job and whose
/// attributes match the spec exactly.
fn find_idle_standby(
    snapshot: &Snapshot,
    tally: &Tally<'_>,
    job: &Job,
    spec: &RunnerSpec,
) -> Option<(String, u64)> {
    snapshot
        .servers
        .iter()
        .filter(|s| s.role() == Some(ServerRole::Standby))
        .filter(|s| !tally.removed.iter().any(|r| r == &s.name))
        .filter(|s| {
            snapshot
                .runner_for(&s.name)
                .is_some_and(|r| r.status == RunnerStatus::Online && !r.busy)
        })
        .filter(|s| {
            let server_labels = s.runner_labels();
            job.labels.iter().all(|l| server_labels.contains(l))
        })
        .find(|s| server_matches_spec(s, spec))
        .map(|s| (s.name.clone(), s.cloud_id))
}

/// The scale-up loop.
pub struct ScaleUp<C, G, B, K> {
    deps: EngineDeps<C, G, B, K>,
    /// Job identities whose spec rejection was already logged.
    rejected_logged: HashSet<(u64, u64)>,
}

impl<C, G, B, K> ScaleUp<C, G, B, K>
where
    C: CloudAdapter,
    G: CiAdapter,
    B: BootstrapAdapter,
    K: Clock,
{
    pub fn new(deps: EngineDeps<C, G, B, K>) -> Self {
        Self {
            deps,
            rejected_logged: HashSet::new(),
        }
    }

    pub async fn run(mut self) -> Result<(), EngineError> {
        let interval = Duration::from_secs(self.deps.config.scale_up_interval);
        tracing::info!("scale-up loop started");
        loop {
            if self.deps.terminate.is_set() {
                break;
            }
            if let Err(err) = self.tick().await {
                tracing::warn!(%err, "scale-up cycle failed");
            }
            tokio::select! {
                _ = self.deps.terminate.wait() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("scale-up loop stopped");
        Ok(())
    }

    /// One planning and dispatch pass.
    pub async fn tick(&mut self) -> Result<(), EngineError> {
        let gauge = *self.deps.api_gauge.borrow();
        if gauge.sampled && gauge.remaining < API_BUDGET_LOW_WATERMARK {
            tracing::warn!(
                remaining = gauge.remaining,
                reset_in_secs = gauge.reset_in_secs,
                "CI API budget is low"
            );
        }

        let jobs = self.deps.ci.list_jobs(JobStatus::Queued).await?;
        let servers = self.deps.cloud.list_servers().await?;
        let runners = self.deps.ci.list_runners().await?;
        let snapshot = Snapshot::new(servers, runners);
        let now_ms = self.deps.clock.epoch_ms();
        let mut pool = RecyclePool::build(&snapshot.servers, &snapshot.runners, now_ms);
        if !self.deps.config.recycle {
            // Recycling off: stale candidates are scale-down's problem.
            pool = RecyclePool::default();
        }
        let pending = self.deps.in_flight.entries();

        let input = PlanInput {
            jobs: &jobs,
            snapshot: &snapshot,
            pending: &pending,
            config: &self.deps.config,
            catalog: &self.deps.catalog,
            prices: &self.deps.prices,
            ssh_keys_hash: &self.deps.ssh_keys_hash,
        };
        let decisions = plan(&input, &mut pool);

        for decision in decisions {
            if self.deps.terminate.is_set() {
                break;
            }
            self.execute(decision).await;
        }
        Ok(())
    }

    async fn execute(&mut self, decision: Decision) {
        match decision {
            Decision::Skip { name, job, reason } => self.log_skip(&name, job, reason),
            Decision::CreateNew { name, spec } => {
                self.dispatch_create(name, ServerRole::Active, spec).await;
            }
            Decision::Rebuild {
                cloud_id,
                from,
                to,
                spec,
            } => {
                let Some(guard) = self.deps.in_flight.insert(&to, spec.labels.clone()) else {
                    return;
                };
                let deps = self.deps.clone();
                let deadline = task_deadline(&self.deps.config);
                let handle = self
                    .deps
                    .pool
                    .spawn_with_deadline(
                        deadline,
                        provision::rebuild_server(deps, guard, cloud_id, from, to, spec),
                    )
                    .await;
                drop(handle);
            }
            Decision::Promote {
                cloud_id,
                from,
                to,
                spec,
            } => self.promote(cloud_id, from, to, spec).await,
            Decision::EvictThenCreate {
                victim_id,
                victim_name,
                name,
                spec,
            } => {
                match self.deps.cloud.delete_server(victim_id).await {
                    Ok(()) => {
                        tracing::info!(victim = %victim_name, for_server = %name, "evicted recyclable server");
                        metrics::inc(&self.deps.metrics.evictions);
                        metrics::inc(&self.deps.metrics.servers_deleted);
                        self.deps.mailbox.send(Event::ServerDeleted {
                            server_name: victim_name,
                            reason: "evicted".to_string(),
                        });
                    }
                    Err(err) => {
                        tracing::warn!(victim = %victim_name, %err, "eviction failed, skipping job this tick");
                        return;
                    }
                }
                self.dispatch_create(name, ServerRole::Active, spec).await;
            }
        }
    }

    async fn dispatch_create(&mut self, name: String, role: ServerRole, spec: RunnerSpec) {
        let Some(guard) = self.deps.in_flight.insert(&name, spec.labels.clone()) else {
            return;
        };
        let deps = self.deps.clone();
        let deadline = task_deadline(&self.deps.config);
        let handle = self
            .deps
            .pool
            .spawn_with_deadline(
                deadline,
                provision::create_server(deps, guard, name, role, spec),
            )
            .await;
        drop(handle);
    }

    async fn promote(&mut self, cloud_id: u64, from: String, to: String, spec: RunnerSpec) {
        let now_secs = self.deps.clock.epoch_ms() / 1000;
        let labels = provision::server_labels(&spec, ServerRole::Active, now_secs);
        match self.deps.cloud.rename_server(cloud_id, &to, labels).await {
            Ok(_) => {
                tracing::info!(from = %from, to = %to, "promoted standby server");
                metrics::inc(&self.deps.metrics.standby_promoted);
            }
            Err(CloudError::NameTaken(_)) => {
                tracing::debug!(from = %from, to = %to, "active name already exists, promotion unnecessary");
            }
            Err(err) => {
                tracing::warn!(from = %from, to = %to, %err, "standby promotion failed");
            }
        }
    }

    fn log_skip(&mut self, name: &str, job: (u64, u64), reason: SkipReason) {
        match reason {
            SkipReason::AlreadyPresent => {
                tracing::debug!(server_name = %name, "server already present");
            }
            SkipReason::SpecRejected(err) => {
                metrics::inc(&self.deps.metrics.jobs_skipped);
                // Log once per job identity; the label set cannot change
                // without a new job event.
                if self.rejected_logged.insert(job) {
                    tracing::warn!(server_name = %name, %err, "job labels rejected");
                } else {
                    tracing::debug!(server_name = %name, %err, "job labels rejected");
                }
            }
            reason => {
                metrics::inc(&self.deps.metrics.jobs_skipped);
                tracing::debug!(server_name = %name, ?reason, "job skipped this tick");
            }
        }
    }
}

#[cfg(test)]
#[path = "scale_up_tests.rs"]
mod tests;
