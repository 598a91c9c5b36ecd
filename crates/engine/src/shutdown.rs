// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide terminate signal.
//!
//! Set on interrupt, fatal loop error, or service stop. Loops poll it
//! between ticks and before worker submissions; `wait()` lets sleeps
//! end early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// Cloneable terminate signal.
#[derive(Clone)]
pub struct Terminate {
    inner: Arc<Inner>,
}

impl Terminate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn set(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolve when the signal is set. Returns immediately if already set.
    pub async fn wait(&self) {
        let mut notified = std::pin::pin!(self.inner.notify.notified());
        // Register before re-checking the flag so a concurrent set() is
        // never missed.
        notified.as_mut().enable();
        if self.is_set() {
            return;
        }
        notified.await;
    }
}

impl Default for Terminate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
