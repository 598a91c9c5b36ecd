// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake CI adapter for testing

use super::{CiAdapter, CiError, RateLimit};
use async_trait::async_trait;
use ghr_core::job::{Job, JobStatus};
use ghr_core::runner::Runner;
use parking_lot::Mutex;
use std::sync::Arc;

/// Recorded CI call.
#[derive(Debug, Clone, PartialEq)]
pub enum CiCall {
    ListJobs { status: JobStatus },
    ListRunners,
    RegistrationToken,
    RemoveRunner { id: u64 },
    RateLimit,
}

struct FakeCiState {
    jobs: Vec<Job>,
    runners: Vec<Runner>,
    rate: RateLimit,
    calls: Vec<CiCall>,
    tokens_issued: u64,
    fail_tokens: bool,
}

/// Fake CI provider with programmable jobs and runners.
#[derive(Clone)]
pub struct FakeCi {
    inner: Arc<Mutex<FakeCiState>>,
}

impl Default for FakeCi {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeCiState {
                jobs: Vec::new(),
                runners: Vec::new(),
                rate: RateLimit {
                    limit: 5000,
                    remaining: 5000,
                    reset_epoch: 0,
                },
                calls: Vec::new(),
                tokens_issued: 0,
                fail_tokens: false,
            })),
        }
    }
}

impl FakeCi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&self, job: Job) {
        self.inner.lock().jobs.push(job);
    }

    pub fn set_jobs(&self, jobs: Vec<Job>) {
        self.inner.lock().jobs = jobs;
    }

    pub fn add_runner(&self, runner: Runner) {
        self.inner.lock().runners.push(runner);
    }

    pub fn set_runners(&self, runners: Vec<Runner>) {
        self.inner.lock().runners = runners;
    }

    pub fn runners(&self) -> Vec<Runner> {
        self.inner.lock().runners.clone()
    }

    pub fn set_rate_limit(&self, rate: RateLimit) {
        self.inner.lock().rate = rate;
    }

    pub fn set_fail_tokens(&self, fail: bool) {
        self.inner.lock().fail_tokens = fail;
    }

    pub fn calls(&self) -> Vec<CiCall> {
        self.inner.lock().calls.clone()
    }

    pub fn tokens_issued(&self) -> u64 {
        self.inner.lock().tokens_issued
    }
}

#[async_trait]
impl CiAdapter for FakeCi {
    async fn list_jobs(&self, status: JobStatus) -> Result<Vec<Job>, CiError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CiCall::ListJobs { status });
        Ok(inner
            .jobs
            .iter()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    async fn list_runners(&self) -> Result<Vec<Runner>, CiError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CiCall::ListRunners);
        Ok(inner.runners.clone())
    }

    async fn registration_token(&self) -> Result<String, CiError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CiCall::RegistrationToken);
        if inner.fail_tokens {
            return Err(CiError::Api {
                status: 403,
                message: "token issuance disabled".to_string(),
            });
        }
        inner.tokens_issued += 1;
        Ok(format!("fake-token-{}", inner.tokens_issued))
    }

    async fn remove_runner(&self, id: u64) -> Result<(), CiError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CiCall::RemoveRunner { id });
        inner.runners.retain(|r| r.id != id);
        Ok(())
    }

    async fn rate_limit(&self) -> Result<RateLimit, CiError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CiCall::RateLimit);
        Ok(inner.rate)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
