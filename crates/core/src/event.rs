// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events exchanged between the control loops through the mailbox.
//!
//! The mailbox is a multi-producer, single-consumer FIFO. Consumers must
//! tolerate duplicate and stale events: an event is a hint, never a
//! source of truth.

use serde::{Deserialize, Serialize};

/// Cross-loop notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A provisioning task completed its bootstrap pipeline.
    ServerReady { server_name: String },

    /// A server was deleted and why.
    ServerDeleted { server_name: String, reason: String },

    /// A provisioning task failed and cleaned up after itself.
    ScaleUpFailure {
        epoch_ms: u64,
        server_name: String,
        labels: Vec<String>,
        error: String,
    },
}
