// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API watch loop: samples the CI provider's rate limit for backpressure.

use crate::shutdown::Terminate;
use ghr_adapters::CiAdapter;
use ghr_core::Clock;
use std::time::Duration;
use tokio::sync::watch;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

/// Last observed rate-limit state, published through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApiGauge {
    pub consumed: u64,
    pub remaining: u64,
    pub reset_in_secs: u64,
    /// False until the first successful sample.
    pub sampled: bool,
}

/// Create the gauge channel with an unsampled initial value.
pub fn gauge_channel() -> (watch::Sender<ApiGauge>, watch::Receiver<ApiGauge>) {
    watch::channel(ApiGauge::default())
}

/// Periodically samples the CI API rate limit.
pub struct ApiWatch<G, K> {
    ci: G,
    clock: K,
    tx: watch::Sender<ApiGauge>,
    terminate: Terminate,
    interval: Duration,
}

impl<G: CiAdapter, K: Clock> ApiWatch<G, K> {
    pub fn new(ci: G, clock: K, tx: watch::Sender<ApiGauge>, terminate: Terminate) -> Self {
        Self {
            ci,
            clock,
            tx,
            terminate,
            interval: SAMPLE_INTERVAL,
        }
    }

    /// Override the sample interval (tests).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Take one sample and publish it.
    pub async fn sample(&self) {
        match self.ci.rate_limit().await {
            Ok(rate) => {
                let now_secs = self.clock.epoch_ms() / 1000;
                let gauge = ApiGauge {
                    consumed: rate.consumed(),
                    remaining: rate.remaining,
                    reset_in_secs: rate.reset_epoch.saturating_sub(now_secs),
                    sampled: true,
                };
                tracing::debug!(
                    consumed = gauge.consumed,
                    remaining = gauge.remaining,
                    reset_in_secs = gauge.reset_in_secs,
                    "sampled CI rate limit"
                );
                let _ = self.tx.send(gauge);
            }
            Err(err) => {
                tracing::warn!(%err, "failed to sample CI rate limit");
            }
        }
    }

    pub async fn run(self) {
        tracing::info!("rate limit watch started");
        loop {
            if self.terminate.is_set() {
                break;
            }
            self.sample().await;
            tokio::select! {
                _ = self.terminate.wait() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("rate limit watch stopped");
    }
}

#[cfg(test)]
#[path = "api_watch_tests.rs"]
mod tests;
