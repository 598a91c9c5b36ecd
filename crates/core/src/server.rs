// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud server owned by the controller, and billing-hour arithmetic.

use crate::name::{ServerName, ServerRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::Ipv4Addr;

/// Cloud label keys written on every owned server.
pub const LABEL_ROLE: &str = "role";
pub const LABEL_SERVER_TYPE: &str = "server_type";
pub const LABEL_LOCATION: &str = "location";
pub const LABEL_IMAGE: &str = "image";
pub const LABEL_RUNNER_LABELS_HASH: &str = "runner_labels_hash";
pub const LABEL_PREFIX: &str = "prefix";
pub const LABEL_SSH_KEYS: &str = "ssh_keys";
/// Epoch seconds when the server was last created or rebuilt. Anchors the
/// runner-registration timeout across recycle rebuilds.
pub const LABEL_PROVISIONED_AT: &str = "provisioned_at";
/// Enumerated runner labels: `label_0`, `label_1`, ...
pub const LABEL_RUNNER_LABEL_PREFIX: &str = "label_";

/// Server power status at the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Off,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Off => write!(f, "off"),
            ServerStatus::Starting => write!(f, "starting"),
            ServerStatus::Running => write!(f, "running"),
            ServerStatus::Stopping => write!(f, "stopping"),
        }
    }
}

/// Server age broken against the hourly billing granularity.
///
/// `age_in_hour = floor(age_seconds / 3600)`;
/// `minute_in_hour = (age_seconds % 3600) / 60`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerAge {
    pub seconds: u64,
}

impl ServerAge {
    pub fn from_seconds(seconds: u64) -> Self {
        Self { seconds }
    }

    /// Completed billing hours.
    pub fn age_in_hour(&self) -> u64 {
        self.seconds / 3600
    }

    /// Minutes elapsed within the current billing hour.
    pub fn minute_in_hour(&self) -> u64 {
        (self.seconds % 3600) / 60
    }

    /// Minutes left before the next billing hour starts.
    pub fn minutes_left_in_hour(&self) -> u64 {
        60 - self.minute_in_hour()
    }
}

impl fmt::Display for ServerAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.seconds / 86_400;
        let hours = (self.seconds % 86_400) / 3600;
        let minutes = (self.seconds % 3600) / 60;
        write!(f, "{days}d{hours}h{minutes}m")
    }
}

/// A controller-owned cloud server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub cloud_id: u64,
    pub name: String,
    pub status: ServerStatus,
    pub server_type: String,
    pub location: String,
    /// Image reference string, from the `image` cloud label.
    pub image: String,
    pub public_ipv4: Option<Ipv4Addr>,
    pub created_at: DateTime<Utc>,
    pub labels: HashMap<String, String>,
}

impl Server {
    /// Structured name, when this server belongs to the controller.
    pub fn server_name(&self) -> Option<ServerName> {
        ServerName::parse(&self.name)
    }

    /// Role from the `role` label, falling back to the name shape.
    pub fn role(&self) -> Option<ServerRole> {
        self.labels
            .get(LABEL_ROLE)
            .and_then(|v| ServerRole::parse(v))
            .or_else(|| self.server_name().map(|n| n.role()))
    }

    /// Age since creation, given the current epoch milliseconds.
    pub fn age(&self, now_ms: u64) -> ServerAge {
        let created_ms = self.created_at.timestamp_millis().max(0) as u64;
        ServerAge::from_seconds(now_ms.saturating_sub(created_ms) / 1000)
    }

    /// Epoch seconds of the last create or rebuild, from the
    /// `provisioned-at` label; falls back to `created_at`.
    pub fn provisioned_at_secs(&self) -> u64 {
        self.labels
            .get(LABEL_PROVISIONED_AT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.created_at.timestamp().max(0) as u64)
    }

    /// Runner labels recovered from the enumerated `label-{i}` cloud labels.
    pub fn runner_labels(&self) -> BTreeSet<String> {
        self.labels
            .iter()
            .filter(|(k, _)| {
                k.strip_prefix(LABEL_RUNNER_LABEL_PREFIX)
                    .is_some_and(|i| i.chars().all(|c| c.is_ascii_digit()))
            })
            .map(|(_, v)| v.to_lowercase())
            .collect()
    }

    /// SSH key-set hash from the `ssh-keys` label.
    pub fn ssh_keys_hash(&self) -> Option<&str> {
        self.labels.get(LABEL_SSH_KEYS).map(|s| s.as_str())
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
