// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI job as observed at the provider.

use crate::name::ServerName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Job status at the CI provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A workflow job observed at the CI provider.
///
/// Identity is `(run_id, job_id)`. Labels are lowercased by the CI
/// adapter so comparisons are case-insensitive throughout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub run_id: u64,
    pub job_id: u64,
    pub workflow_run_id: u64,
    pub status: JobStatus,
    pub labels: BTreeSet<String>,
}

impl Job {
    pub fn new(run_id: u64, job_id: u64, status: JobStatus, labels: BTreeSet<String>) -> Self {
        Self {
            run_id,
            job_id,
            workflow_run_id: run_id,
            status,
            labels,
        }
    }

    /// Job identity.
    pub fn identity(&self) -> (u64, u64) {
        (self.run_id, self.job_id)
    }

    /// Deterministic name of the server that would run this job.
    pub fn server_name(&self) -> ServerName {
        ServerName::active(self.run_id, self.job_id)
    }

    /// True if every label in `required` is present on this job.
    pub fn has_labels(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|l| self.labels.contains(&l.to_lowercase()))
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
