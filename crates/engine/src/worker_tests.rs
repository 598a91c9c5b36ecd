// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn pool_runs_tasks_to_completion() {
    let pool = WorkerPool::new(2);
    let handle = pool.spawn(async { 21 * 2 }).await;
    assert_eq!(handle.await.unwrap(), 42);
}

#[tokio::test]
async fn pool_bounds_concurrency() {
    let pool = WorkerPool::new(2);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let handle = pool
            .spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .await;
        handles.push(handle);
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(
        peak.load(Ordering::SeqCst) <= 2,
        "peak concurrency {} exceeded pool size",
        peak.load(Ordering::SeqCst)
    );
}

#[tokio::test(start_paused = true)]
async fn deadline_cuts_off_slow_tasks() {
    let pool = WorkerPool::new(1);
    let handle = pool
        .spawn_with_deadline(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "done"
        })
        .await;
    assert_eq!(handle.await.unwrap(), None);
}

#[tokio::test]
async fn in_flight_names_are_exclusive() {
    let registry = InFlight::new();
    let labels: BTreeSet<String> = ["self-hosted".to_string()].into_iter().collect();

    let guard = registry.insert("github-hetzner-runner-1-2", labels.clone());
    assert!(guard.is_some());
    assert!(registry.insert("github-hetzner-runner-1-2", labels.clone()).is_none());
    assert!(registry.contains("github-hetzner-runner-1-2"));

    drop(guard);
    assert!(!registry.contains("github-hetzner-runner-1-2"));
    assert!(registry.insert("github-hetzner-runner-1-2", labels).is_some());
}

#[tokio::test]
async fn in_flight_entries_are_sorted() {
    let registry = InFlight::new();
    let labels = BTreeSet::new();
    let _b = registry.insert("b", labels.clone());
    let _a = registry.insert("a", labels.clone());

    let names: Vec<String> = registry.entries().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["a", "b"]);
}
