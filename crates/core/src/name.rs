// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server name schema.
//!
//! Server names are the single join key between the CI provider and the
//! cloud: a runner is named after its server, and the name encodes the
//! server's role. Anything outside [`SERVER_NAME_PREFIX`] is not ours and
//! is never touched, even on error paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix carried by every controller-owned server and runner.
pub const SERVER_NAME_PREFIX: &str = "github-hetzner-runner";

/// Role of a controller-owned server, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerRole {
    /// Serving (or about to serve) one specific job.
    Active,
    /// Powered off, kept within the billing hour for reuse.
    Recycle,
    /// Pre-provisioned warm runner.
    Standby,
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerRole::Active => write!(f, "active"),
            ServerRole::Recycle => write!(f, "recycle"),
            ServerRole::Standby => write!(f, "standby"),
        }
    }
}

impl ServerRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ServerRole::Active),
            "recycle" => Some(ServerRole::Recycle),
            "standby" => Some(ServerRole::Standby),
            _ => None,
        }
    }
}

/// Structured form of a controller-owned server name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerName {
    /// `{prefix}-{run_id}-{job_id}`
    Active { run_id: u64, job_id: u64 },
    /// `{prefix}-recycle-{uid}`
    Recycle { uid: String },
    /// `{prefix}-standby-{group}-{uid}`
    Standby { group: String, uid: String },
}

impl ServerName {
    pub fn active(run_id: u64, job_id: u64) -> Self {
        ServerName::Active { run_id, job_id }
    }

    pub fn recycle(uid: impl Into<String>) -> Self {
        ServerName::Recycle { uid: uid.into() }
    }

    pub fn standby(group: impl Into<String>, uid: impl Into<String>) -> Self {
        ServerName::Standby {
            group: group.into(),
            uid: uid.into(),
        }
    }

    /// True if the name carries the controller prefix.
    pub fn is_owned(name: &str) -> bool {
        name.strip_prefix(SERVER_NAME_PREFIX)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Parse a controller-owned server name. Returns `None` for names the
    /// controller does not own or cannot decode.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name
            .strip_prefix(SERVER_NAME_PREFIX)?
            .strip_prefix('-')?;

        if let Some(uid) = rest.strip_prefix("recycle-") {
            if uid.is_empty() || !uid.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            return Some(ServerName::recycle(uid));
        }

        if let Some(tail) = rest.strip_prefix("standby-") {
            let (group, uid) = tail.rsplit_once('-')?;
            if group.is_empty() || uid.is_empty() || !uid.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            return Some(ServerName::standby(group, uid));
        }

        let (run_id, job_id) = rest.split_once('-')?;
        Some(ServerName::Active {
            run_id: run_id.parse().ok()?,
            job_id: job_id.parse().ok()?,
        })
    }

    pub fn role(&self) -> ServerRole {
        match self {
            ServerName::Active { .. } => ServerRole::Active,
            ServerName::Recycle { .. } => ServerRole::Recycle,
            ServerName::Standby { .. } => ServerRole::Standby,
        }
    }

    /// Job identity encoded in an active name.
    pub fn job_identity(&self) -> Option<(u64, u64)> {
        match self {
            ServerName::Active { run_id, job_id } => Some((*run_id, *job_id)),
            _ => None,
        }
    }

    /// Prefix shared by all active servers of one workflow run.
    pub fn run_prefix(run_id: u64) -> String {
        format!("{SERVER_NAME_PREFIX}-{run_id}-")
    }

    /// Prefix shared by all standby servers of one group.
    pub fn standby_prefix(group: &str) -> String {
        format!("{SERVER_NAME_PREFIX}-standby-{group}-")
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerName::Active { run_id, job_id } => {
                write!(f, "{SERVER_NAME_PREFIX}-{run_id}-{job_id}")
            }
            ServerName::Recycle { uid } => write!(f, "{SERVER_NAME_PREFIX}-recycle-{uid}"),
            ServerName::Standby { group, uid } => {
                write!(f, "{SERVER_NAME_PREFIX}-standby-{group}-{uid}")
            }
        }
    }
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
