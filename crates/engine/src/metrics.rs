// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local counters for controller activity.
//!
//! The metrics HTTP surface is external glue; these counters are the
//! numbers it would expose.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters, shared across loops and tasks.
#[derive(Debug, Default)]
pub struct Metrics {
    pub servers_created: AtomicU64,
    pub servers_deleted: AtomicU64,
    pub servers_recycled: AtomicU64,
    pub servers_rebuilt: AtomicU64,
    pub standby_promoted: AtomicU64,
    pub evictions: AtomicU64,
    pub scale_up_failures: AtomicU64,
    pub jobs_skipped: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub servers_created: u64,
    pub servers_deleted: u64,
    pub servers_recycled: u64,
    pub servers_rebuilt: u64,
    pub standby_promoted: u64,
    pub evictions: u64,
    pub scale_up_failures: u64,
    pub jobs_skipped: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            servers_created: self.servers_created.load(Ordering::Relaxed),
            servers_deleted: self.servers_deleted.load(Ordering::Relaxed),
            servers_recycled: self.servers_recycled.load(Ordering::Relaxed),
            servers_rebuilt: self.servers_rebuilt.load(Ordering::Relaxed),
            standby_promoted: self.standby_promoted.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            scale_up_failures: self.scale_up_failures.load(Ordering::Relaxed),
            jobs_skipped: self.jobs_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Increment a counter by one.
pub fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
