// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner specification derived from a job's labels.

use crate::catalog::ImageRef;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Stable hash of the attributes a recycle candidate must share with a
/// spec to serve it: server type, location, image, and SSH key set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint. `location` is the concrete location for a
    /// server, or the requested one for a spec (`None` when the spec
    /// leaves placement to the cloud).
    pub fn compute(
        server_type: &str,
        location: Option<&str>,
        image: &str,
        ssh_keys_hash: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(server_type.to_lowercase());
        hasher.update("\n");
        hasher.update(location.unwrap_or("").to_lowercase());
        hasher.update("\n");
        hasher.update(image.to_lowercase());
        hasher.update("\n");
        hasher.update(ssh_keys_hash);
        let digest = hasher.finalize();
        Self(hex_prefix(&digest, 16))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable hash of a runner label set, written to the
/// `runner_labels_hash` cloud label.
pub fn labels_hash(labels: &BTreeSet<String>) -> String {
    let mut hasher = Sha256::new();
    for label in labels {
        hasher.update(label.to_lowercase());
        hasher.update("\n");
    }
    hex_prefix(&hasher.finalize(), 16)
}

/// Hash an SSH key set (cloud key ids) into a label-sized value.
pub fn ssh_keys_hash(key_ids: &[u64]) -> String {
    let mut ids: Vec<u64> = key_ids.to_vec();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.to_le_bytes());
    }
    hex_prefix(&hasher.finalize(), 16)
}

fn hex_prefix(digest: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for byte in digest {
        if out.len() >= chars {
            break;
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out.truncate(chars);
    out
}

/// Everything needed to provision one server for one job.
///
/// Derivation from a label set is deterministic: identical inputs yield
/// an identical spec and an identical fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSpec {
    pub server_type: String,
    /// `None` leaves placement to the cloud.
    pub location: Option<String>,
    pub image: ImageRef,
    /// Resolved cloud image id, used for create and rebuild calls.
    pub image_id: u64,
    pub setup_script: PathBuf,
    pub startup_script: PathBuf,
    /// Full expanded label set the runner registers with.
    pub labels: BTreeSet<String>,
    /// Hash of the controller's SSH key set.
    pub ssh_keys_hash: String,
}

impl RunnerSpec {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(
            &self.server_type,
            self.location.as_deref(),
            &self.image.to_string(),
            &self.ssh_keys_hash,
        )
    }

    pub fn labels_hash(&self) -> String {
        labels_hash(&self.labels)
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
