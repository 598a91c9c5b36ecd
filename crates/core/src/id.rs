// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unique identifier generation for server names.

use crate::clock::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique, creation-order-preserving identifiers.
///
/// Identifiers are fixed-width epoch-microsecond stamps so lexicographic
/// order equals creation order. A process-local sequence guards against
/// two identifiers landing on the same microsecond.
#[derive(Clone)]
pub struct UidGen {
    last: Arc<AtomicU64>,
}

impl UidGen {
    pub fn new() -> Self {
        Self {
            last: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the next identifier from the given clock.
    pub fn next(&self, clock: &impl Clock) -> String {
        let mut us = clock.epoch_us();
        loop {
            let last = self.last.load(Ordering::SeqCst);
            if us <= last {
                us = last + 1;
            }
            if self
                .last
                .compare_exchange(last, us, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }
        format!("{:017}", us)
    }
}

impl Default for UidGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
