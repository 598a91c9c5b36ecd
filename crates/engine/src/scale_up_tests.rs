// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::recycle::RecyclePool;
use crate::test_helpers::{job, rig, rig_with, runner, TestRig, RIG_EPOCH_MS};
use ghr_adapters::CloudCall;
use ghr_core::catalog::PriceCatalog;
use ghr_core::server::{ServerStatus, LABEL_ROLE};
use std::sync::Arc;

const EPOCH_S: i64 = (RIG_EPOCH_MS / 1000) as i64;

fn plan_for(rig: &TestRig, jobs: &[Job]) -> Vec<Decision> {
    let snapshot = Snapshot::new(rig.cloud.servers(), rig.ci.runners());
    let pending = rig.deps.in_flight.entries();
    let mut pool = RecyclePool::build(&snapshot.servers, &snapshot.runners, RIG_EPOCH_MS);
    let input = PlanInput {
        jobs,
        snapshot: &snapshot,
        pending: &pending,
        config: &rig.deps.config,
        catalog: &rig.deps.catalog,
        prices: &rig.deps.prices,
        ssh_keys_hash: &rig.deps.ssh_keys_hash,
    };
    plan(&input, &mut pool)
}

#[tokio::test]
async fn happy_path_creates_one_server_per_job() {
    let rig = rig_with(|c| c.max_runners = 2);
    rig.ci.add_job(job(7117741000, 19650052, &["self-hosted", "type-cpx21"]));

    let mut scale_up = ScaleUp::new(rig.deps.clone());
    scale_up.tick().await.unwrap();
    rig.settle().await;

    let server = rig
        .cloud
        .server_by_name("github-hetzner-runner-7117741000-19650052")
        .expect("server should exist");
    assert_eq!(server.server_type, "cpx21");
    assert_eq!(server.location, "fsn1");
    assert_eq!(server.labels.get(LABEL_ROLE).map(String::as_str), Some("active"));
    assert_eq!(rig.deps.metrics.snapshot().servers_created, 1);
}

#[tokio::test]
async fn existing_server_means_noop() {
    let rig = rig();
    rig.seed_server(
        "github-hetzner-runner-1-2",
        ServerStatus::Running,
        ghr_core::ServerRole::Active,
        &["self-hosted"],
        EPOCH_S,
    );
    rig.ci.add_job(job(1, 2, &["self-hosted"]));

    let decisions = plan_for(&rig, &[job(1, 2, &["self-hosted"])]);
    assert_eq!(decisions.len(), 1);
    assert!(matches!(
        &decisions[0],
        Decision::Skip {
            reason: SkipReason::AlreadyPresent,
            ..
        }
    ));
}

#[tokio::test]
async fn jobs_without_required_label_are_skipped() {
    let rig = rig();
    let decisions = plan_for(&rig, &[job(1, 2, &["linux"])]);
    assert!(matches!(
        &decisions[0],
        Decision::Skip {
            reason: SkipReason::MissingLabel(l),
            ..
        } if l == "self-hosted"
    ));
}

#[tokio::test]
async fn invalid_labels_reject_the_job() {
    let rig = rig();
    let decisions = plan_for(&rig, &[job(1, 2, &["self-hosted", "type-cx999"])]);
    assert!(matches!(
        &decisions[0],
        Decision::Skip {
            reason: SkipReason::SpecRejected(_),
            ..
        }
    ));
}

#[tokio::test]
async fn workflow_run_cap_limits_servers_per_run() {
    let rig = rig_with(|c| c.max_runners_in_workflow_run = Some(2));
    let jobs = vec![
        job(100, 1, &["self-hosted"]),
        job(100, 2, &["self-hosted"]),
        job(100, 3, &["self-hosted"]),
        job(200, 9, &["self-hosted"]),
    ];

    let decisions = plan_for(&rig, &jobs);
    let creates = decisions
        .iter()
        .filter(|d| matches!(d, Decision::CreateNew { .. }))
        .count();
    assert_eq!(creates, 3, "two for run 100, one for run 200");
    assert!(matches!(
        &decisions[2],
        Decision::Skip {
            reason: SkipReason::WorkflowRunCap,
            ..
        }
    ));
}

#[tokio::test]
async fn per_label_cap_is_enforced() {
    let rig = rig_with(|c| {
        c.max_runners_for_label = vec![ghr_config::LabelCap {
            labels: vec!["type-cpx21".to_string()],
            max: 1,
        }];
    });
    rig.seed_server(
        "github-hetzner-runner-5-5",
        ServerStatus::Running,
        ghr_core::ServerRole::Active,
        &["self-hosted", "type-cpx21"],
        EPOCH_S,
    );

    let decisions = plan_for(&rig, &[job(6, 6, &["self-hosted", "type-cpx21"])]);
    assert!(matches!(
        &decisions[0],
        Decision::Skip {
            reason: SkipReason::LabelCap(_),
            ..
        }
    ));

    // A job outside the capped label set still gets a server.
    let decisions = plan_for(&rig, &[job(7, 7, &["self-hosted"])]);
    assert!(matches!(&decisions[0], Decision::CreateNew { .. }));
}

#[tokio::test]
async fn at_cap_with_matching_recyclable_rebuilds() {
    let rig = rig_with(|c| c.max_runners = 1);
    rig.seed_server(
        "github-hetzner-runner-recycle-00001",
        ServerStatus::Off,
        ghr_core::ServerRole::Recycle,
        &["self-hosted"],
        EPOCH_S - 600,
    );
    rig.ci.add_job(job(8, 8, &["self-hosted"]));

    let mut scale_up = ScaleUp::new(rig.deps.clone());
    scale_up.tick().await.unwrap();
    rig.settle().await;

    // Renamed and reimaged, never created.
    let calls = rig.cloud.calls();
    assert!(calls.iter().any(|c| matches!(
        c,
        CloudCall::Rename { to, .. } if to == "github-hetzner-runner-8-8"
    )));
    assert!(calls.iter().any(|c| matches!(c, CloudCall::Rebuild { .. })));
    assert!(!calls.iter().any(|c| matches!(c, CloudCall::Create { .. })));
    assert_eq!(rig.cloud.servers().len(), 1);
}

#[tokio::test]
async fn at_cap_with_mismatch_evicts_cheapest_candidate() {
    // R1: cpx21, 20 min into hour, $0.012/h -> $0.008 unused budget.
    // R2: cx22, 40 min into hour, $0.006/h -> $0.002 unused budget.
    let mut rig = rig_with(|c| c.max_runners = 1);
    let mut prices = PriceCatalog::new();
    prices.insert("cpx21", "fsn1", 0.012);
    prices.insert("cx22", "fsn1", 0.006);
    rig.deps.prices = Arc::new(prices);

    rig.seed_server(
        "github-hetzner-runner-recycle-00001",
        ServerStatus::Off,
        ghr_core::ServerRole::Recycle,
        &["self-hosted", "type-cpx21"],
        EPOCH_S - 20 * 60,
    );
    rig.seed_server(
        "github-hetzner-runner-recycle-00002",
        ServerStatus::Off,
        ghr_core::ServerRole::Recycle,
        &["self-hosted"],
        EPOCH_S - 40 * 60,
    );
    rig.ci.add_job(job(9, 9, &["self-hosted", "type-cax21"]));

    let mut scale_up = ScaleUp::new(rig.deps.clone());
    scale_up.tick().await.unwrap();
    rig.settle().await;

    // The cx22 candidate had the lowest unused budget and was evicted.
    assert!(rig
        .cloud
        .server_by_name("github-hetzner-runner-recycle-00002")
        .is_none());
    assert!(rig
        .cloud
        .server_by_name("github-hetzner-runner-recycle-00001")
        .is_some());
    let created = rig.cloud.server_by_name("github-hetzner-runner-9-9").unwrap();
    assert_eq!(created.server_type, "cax21");
    assert_eq!(rig.deps.metrics.snapshot().evictions, 1);
}

#[tokio::test]
async fn at_most_one_eviction_per_tick() {
    let rig = rig_with(|c| c.max_runners = 1);
    rig.seed_server(
        "github-hetzner-runner-recycle-00001",
        ServerStatus::Off,
        ghr_core::ServerRole::Recycle,
        &["self-hosted"],
        EPOCH_S - 600,
    );
    rig.seed_server(
        "github-hetzner-runner-recycle-00002",
        ServerStatus::Off,
        ghr_core::ServerRole::Recycle,
        &["self-hosted"],
        EPOCH_S - 1200,
    );

    let jobs = vec![
        job(10, 1, &["self-hosted", "type-cax21"]),
        job(10, 2, &["self-hosted", "type-cax21"]),
    ];
    let decisions = plan_for(&rig, &jobs);

    let evictions = decisions
        .iter()
        .filter(|d| matches!(d, Decision::EvictThenCreate { .. }))
        .count();
    assert_eq!(evictions, 1);
    assert!(matches!(
        &decisions[1],
        Decision::Skip {
            reason: SkipReason::MaxRunners,
            ..
        }
    ));
}

#[tokio::test]
async fn standby_promotion_renames_instead_of_creating() {
    let rig = rig_with(|c| {
        c.standby_runners = vec![ghr_config::StandbyGroup {
            labels: vec!["self-hosted".to_string(), "type-cpx21".to_string()],
            count: 1,
            replenish_immediately: true,
        }];
    });
    rig.seed_server(
        "github-hetzner-runner-standby-g0-00001",
        ServerStatus::Running,
        ghr_core::ServerRole::Standby,
        &["self-hosted", "type-cpx21"],
        EPOCH_S - 300,
    );
    rig.ci.add_runner(runner(
        1,
        "github-hetzner-runner-standby-g0-00001",
        ghr_core::RunnerStatus::Online,
        false,
        &["self-hosted", "type-cpx21"],
    ));
    rig.ci.add_job(job(11, 11, &["self-hosted", "type-cpx21"]));

    let mut scale_up = ScaleUp::new(rig.deps.clone());
    scale_up.tick().await.unwrap();
    rig.settle().await;

    let calls = rig.cloud.calls();
    assert!(calls.iter().any(|c| matches!(
        c,
        CloudCall::Rename { from, to, .. }
            if from == "github-hetzner-runner-standby-g0-00001"
                && to == "github-hetzner-runner-11-11"
    )));
    assert!(!calls.iter().any(|c| matches!(c, CloudCall::Create { .. })));
    assert_eq!(rig.deps.metrics.snapshot().standby_promoted, 1);
}

#[tokio::test]
async fn busy_standby_is_not_promoted() {
    let rig = rig();
    rig.seed_server(
        "github-hetzner-runner-standby-g0-00001",
        ServerStatus::Running,
        ghr_core::ServerRole::Standby,
        &["self-hosted"],
        EPOCH_S - 300,
    );
    rig.ci.add_runner(runner(
        1,
        "github-hetzner-runner-standby-g0-00001",
        ghr_core::RunnerStatus::Online,
        true,
        &["self-hosted"],
    ));

    let decisions = plan_for(&rig, &[job(12, 12, &["self-hosted"])]);
    assert!(matches!(&decisions[0], Decision::CreateNew { .. }));
}

#[tokio::test]
async fn planning_twice_on_frozen_state_is_identical() {
    let rig = rig_with(|c| c.max_runners = 3);
    rig.seed_server(
        "github-hetzner-runner-recycle-00001",
        ServerStatus::Off,
        ghr_core::ServerRole::Recycle,
        &["self-hosted"],
        EPOCH_S - 600,
    );
    let jobs = vec![
        job(20, 1, &["self-hosted"]),
        job(20, 2, &["self-hosted", "type-cpx21"]),
        job(20, 3, &["linux-only"]),
    ];

    let first = plan_for(&rig, &jobs);
    let second = plan_for(&rig, &jobs);
    assert_eq!(first, second);
}

#[tokio::test]
async fn in_flight_tasks_count_toward_caps() {
    let rig = rig_with(|c| c.max_runners = 1);
    let spec = rig.spec(&["self-hosted"]);
    let _guard = rig
        .deps
        .in_flight
        .insert("github-hetzner-runner-30-1", spec.labels.clone())
        .unwrap();

    let decisions = plan_for(&rig, &[job(30, 2, &["self-hosted"])]);
    assert!(matches!(
        &decisions[0],
        Decision::Skip {
            reason: SkipReason::MaxRunners,
            ..
        }
    ));
}

#[tokio::test]
async fn in_flight_name_is_already_present() {
    let rig = rig();
    let spec = rig.spec(&["self-hosted"]);
    let _guard = rig
        .deps
        .in_flight
        .insert("github-hetzner-runner-31-1", spec.labels.clone())
        .unwrap();

    let decisions = plan_for(&rig, &[job(31, 1, &["self-hosted"])]);
    assert!(matches!(
        &decisions[0],
        Decision::Skip {
            reason: SkipReason::AlreadyPresent,
            ..
        }
    ));
}

#[tokio::test]
async fn recycling_disabled_never_rebuilds() {
    let rig = rig_with(|c| {
        c.max_runners = 1;
        c.recycle = false;
    });
    rig.seed_server(
        "github-hetzner-runner-recycle-00001",
        ServerStatus::Off,
        ghr_core::ServerRole::Recycle,
        &["self-hosted"],
        EPOCH_S - 600,
    );
    rig.ci.add_job(job(13, 13, &["self-hosted"]));

    let mut scale_up = ScaleUp::new(rig.deps.clone());
    scale_up.tick().await.unwrap();
    rig.settle().await;

    let calls = rig.cloud.calls();
    assert!(!calls.iter().any(|c| matches!(c, CloudCall::Rename { .. })));
    assert!(!calls.iter().any(|c| matches!(c, CloudCall::Rebuild { .. })));
}
