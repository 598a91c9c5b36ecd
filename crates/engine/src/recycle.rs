// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recycle pool: powered-off servers kept within their billing hour,
//! indexed for reuse or eviction.
//!
//! Rebuilt from the cloud snapshot at the start of every scale-up tick;
//! eventual consistency between ticks is fine because the naming
//! invariants prevent double-use.

use ghr_core::catalog::{ImageRef, PriceCatalog};
use ghr_core::runner::Runner;
use ghr_core::server::{Server, ServerStatus};
use ghr_core::{RunnerSpec, ServerRole};
use rand::Rng;

/// One recyclable server.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub cloud_id: u64,
    pub name: String,
    pub server_type: String,
    pub location: String,
    /// Image reference in label form.
    pub image: String,
    pub ssh_keys_hash: String,
    pub created_at_ms: u64,
    pub minute_in_hour: u64,
}

impl Candidate {
    /// Remaining dollar value of the current billing hour, or `None`
    /// when the price table has no entry (unknown prices sort last).
    pub fn unused_budget(&self, prices: &PriceCatalog) -> Option<f64> {
        let per_minute = prices.price_per_minute(&self.server_type, &self.location)?;
        Some((60 - self.minute_in_hour) as f64 * per_minute)
    }
}

/// Strict match: a candidate serves a spec only when server type, image,
/// and SSH key set are equal, and the location is equal whenever the
/// spec requests one. A larger server type never matches — that would
/// silently upgrade small jobs onto expensive hosts.
pub fn candidate_matches_spec(candidate: &Candidate, spec: &RunnerSpec) -> bool {
    if !candidate.server_type.eq_ignore_ascii_case(&spec.server_type) {
        return false;
    }
    if let Some(wanted) = &spec.location {
        if !candidate.location.eq_ignore_ascii_case(wanted) {
            return false;
        }
    }
    if candidate.ssh_keys_hash != spec.ssh_keys_hash {
        return false;
    }
    match ImageRef::parse(&candidate.image, '-') {
        Ok(image) => image == spec.image,
        Err(_) => false,
    }
}

/// Same strict policy applied directly to a server (used for standby
/// promotion matching).
pub fn server_matches_spec(server: &Server, spec: &RunnerSpec) -> bool {
    if !server.server_type.eq_ignore_ascii_case(&spec.server_type) {
        return false;
    }
    if let Some(wanted) = &spec.location {
        if !server.location.eq_ignore_ascii_case(wanted) {
            return false;
        }
    }
    if server.ssh_keys_hash() != Some(spec.ssh_keys_hash.as_str()) {
        return false;
    }
    match ImageRef::parse(&server.image, '-') {
        Ok(image) => image == spec.image,
        Err(_) => false,
    }
}

/// In-memory index over recyclable servers.
#[derive(Debug, Default)]
pub struct RecyclePool {
    candidates: Vec<Candidate>,
}

impl RecyclePool {
    /// Collect eviction-safe candidates from a snapshot: powered off,
    /// carrying the recycle role, and without a live runner.
    pub fn build(servers: &[Server], runners: &[Runner], now_ms: u64) -> Self {
        let mut candidates: Vec<Candidate> = servers
            .iter()
            .filter(|s| s.status == ServerStatus::Off)
            .filter(|s| s.role() == Some(ServerRole::Recycle))
            .filter(|s| {
                !runners
                    .iter()
                    .any(|r| r.name == s.name && r.status == ghr_core::RunnerStatus::Online)
            })
            .map(|s| Candidate {
                cloud_id: s.cloud_id,
                name: s.name.clone(),
                server_type: s.server_type.clone(),
                location: s.location.clone(),
                image: s.image.clone(),
                ssh_keys_hash: s.ssh_keys_hash().unwrap_or_default().to_string(),
                created_at_ms: s.created_at.timestamp_millis().max(0) as u64,
                minute_in_hour: s.age(now_ms).minute_in_hour(),
            })
            .collect();
        // Oldest first so matching drains in creation order.
        candidates.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.name.cmp(&b.name))
        });
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Take the oldest candidate matching the spec, removing it from the
    /// pool so one server is never planned twice in a tick.
    pub fn take_match(&mut self, spec: &RunnerSpec) -> Option<Candidate> {
        let index = self
            .candidates
            .iter()
            .position(|c| candidate_matches_spec(c, spec))?;
        Some(self.candidates.remove(index))
    }

    /// Pick an eviction victim and remove it from the pool.
    ///
    /// `delete_random` picks uniformly at random; otherwise the victim
    /// is the candidate with the lowest unused budget, ties broken by
    /// oldest `created_at`.
    pub fn take_victim(&mut self, delete_random: bool, prices: &PriceCatalog) -> Option<Candidate> {
        if self.candidates.is_empty() {
            return None;
        }
        let index = if delete_random {
            rand::thread_rng().gen_range(0..self.candidates.len())
        } else {
            self.cheapest_index(prices)?
        };
        Some(self.candidates.remove(index))
    }

    fn cheapest_index(&self, prices: &PriceCatalog) -> Option<usize> {
        self.candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let budget_a = a.unused_budget(prices).unwrap_or(f64::INFINITY);
                let budget_b = b.unused_budget(prices).unwrap_or(f64::INFINITY);
                budget_a
                    .partial_cmp(&budget_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.created_at_ms.cmp(&b.created_at_ms))
                    .then_with(|| a.name.cmp(&b.name))
            })
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
#[path = "recycle_tests.rs"]
mod tests;
