// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-hosted runner as observed at the CI provider.

use crate::name::ServerName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Runner connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Online,
    Offline,
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerStatus::Online => write!(f, "online"),
            RunnerStatus::Offline => write!(f, "offline"),
        }
    }
}

/// A self-hosted runner. Its name equals the owning server's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runner {
    pub id: u64,
    pub name: String,
    pub status: RunnerStatus,
    pub busy: bool,
    pub labels: BTreeSet<String>,
}

impl Runner {
    /// True if the runner is registered but idle.
    pub fn is_unused(&self) -> bool {
        self.status == RunnerStatus::Online && !self.busy
    }

    /// Structured name, when the runner belongs to this controller.
    pub fn server_name(&self) -> Option<ServerName> {
        ServerName::parse(&self.name)
    }
}
