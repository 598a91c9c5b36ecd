// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded worker pool and the in-flight task registry.
//!
//! Per-server tasks are the only source of parallelism; the pool caps
//! them with a semaphore. The in-flight registry lets planners count
//! servers that are being created but not yet visible in the cloud
//! snapshot, so caps hold across tick boundaries.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Fixed-size executor for per-server tasks.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Spawn a task once a worker slot frees up. Backpressure happens
    /// here: the caller awaits the slot, not the task.
    pub async fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("pool semaphore is never closed"));
        tokio::spawn(async move {
            let _permit = permit;
            task.await
        })
    }

    /// Spawn with an overall deadline; the task resolves to `None` when
    /// the deadline passes first.
    pub async fn spawn_with_deadline<F>(
        &self,
        deadline: Duration,
        task: F,
    ) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.spawn(async move { tokio::time::timeout(deadline, task).await.ok() })
            .await
    }

    /// Free worker slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Registry of provisioning tasks that are dispatched but not finished:
/// server name to the runner labels it will carry.
#[derive(Clone, Default)]
pub struct InFlight {
    inner: Arc<Mutex<HashMap<String, BTreeSet<String>>>>,
}

/// Removes its entry when dropped, including on panic or timeout.
pub struct InFlightGuard {
    registry: InFlight,
    name: String,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task by server name. Returns `None` if a task for this
    /// name is already running (the name linearizes work per server).
    pub fn insert(&self, name: &str, labels: BTreeSet<String>) -> Option<InFlightGuard> {
        let mut inner = self.inner.lock();
        if inner.contains_key(name) {
            return None;
        }
        inner.insert(name.to_string(), labels);
        Some(InFlightGuard {
            registry: self.clone(),
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Snapshot of (name, labels) pairs, sorted by name.
    pub fn entries(&self) -> Vec<(String, BTreeSet<String>)> {
        let mut entries: Vec<_> = self
            .inner
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.inner.lock().remove(&self.name);
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
