// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox for cross-loop hand-offs.
//!
//! Multi-producer, single-consumer FIFO with unbounded capacity.
//! Producers never block; the consumer drains opportunistically at tick
//! boundaries and must tolerate duplicate or stale events.

use ghr_core::Event;
use tokio::sync::mpsc;

/// Sending half, cloned into every loop and provisioning task.
#[derive(Clone)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<Event>,
}

/// Receiving half, owned by the scale-down loop.
pub struct MailboxReader {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Mailbox {
    pub fn new() -> (Mailbox, MailboxReader) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Mailbox { tx }, MailboxReader { rx })
    }

    /// Post an event. Sends after the reader is gone are dropped;
    /// events are hints, losing one during shutdown is harmless.
    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl MailboxReader {
    /// Drain everything currently queued without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
