// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI adapter: typed surface over the CI provider.

mod cache;
mod github;

pub use cache::{CachePolicy, HttpCache};
pub use github::GithubCi;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CiCall, FakeCi};

use async_trait::async_trait;
use ghr_core::job::{Job, JobStatus};
use ghr_core::runner::Runner;
use thiserror::Error;

/// Errors from CI operations.
#[derive(Debug, Error)]
pub enum CiError {
    #[error("CI API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Rate-limit counters sampled from the CI provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Epoch seconds when the window resets.
    pub reset_epoch: u64,
}

impl RateLimit {
    pub fn consumed(&self) -> u64 {
        self.limit.saturating_sub(self.remaining)
    }
}

/// Adapter for the CI provider.
#[async_trait]
pub trait CiAdapter: Clone + Send + Sync + 'static {
    /// Jobs in the given status across the repository's workflow runs,
    /// newest run first. Labels are lowercased.
    async fn list_jobs(&self, status: JobStatus) -> Result<Vec<Job>, CiError>;

    /// Self-hosted runners registered at the repository.
    async fn list_runners(&self) -> Result<Vec<Runner>, CiError>;

    /// A fresh, short-lived runner registration token.
    async fn registration_token(&self) -> Result<String, CiError>;

    /// Deregister a runner by id.
    async fn remove_runner(&self, id: u64) -> Result<(), CiError>;

    /// Current rate-limit counters.
    async fn rate_limit(&self) -> Result<RateLimit, CiError>;
}
