// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed conditional-GET cache.
//!
//! CI hosts expire immediately and revalidate with `ETag` /
//! `Last-Modified`; every other host is never cached. Revalidated 304s
//! serve the stored body, which keeps the controller inside the CI
//! provider's rate limit. Cache I/O is best-effort: a broken cache file
//! degrades to a plain GET.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Per-host caching behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Expire immediately; revalidate with conditional headers.
    Revalidate,
    /// Never store.
    NoStore,
}

/// One stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub body: String,
}

/// Store of cached GET responses, one JSON file per URL.
#[derive(Debug, Clone)]
pub struct HttpCache {
    dir: PathBuf,
    revalidate_hosts: Vec<String>,
}

impl HttpCache {
    /// `revalidate_hosts` lists CI hosts; a host matches exactly or as a
    /// subdomain (`api.github.com` matches `github.com`).
    pub fn new(dir: impl Into<PathBuf>, revalidate_hosts: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            revalidate_hosts,
        }
    }

    pub fn policy(&self, host: &str) -> CachePolicy {
        let matches = self.revalidate_hosts.iter().any(|h| {
            host.eq_ignore_ascii_case(h)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", h.to_ascii_lowercase()))
        });
        if matches {
            CachePolicy::Revalidate
        } else {
            CachePolicy::NoStore
        }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        let mut name = String::with_capacity(32);
        for byte in digest.iter().take(16) {
            name.push_str(&format!("{byte:02x}"));
        }
        self.dir.join(format!("{name}.json"))
    }

    /// Look up a stored response for this URL.
    pub fn get(&self, url: &str) -> Option<CachedResponse> {
        let path = self.path_for(url);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedResponse>(&raw) {
            Ok(cached) if cached.url == url => Some(cached),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "discarding unreadable cache entry");
                let _ = std::fs::remove_file(&path);
                None
            }
        }
    }

    /// Store a response. No-op unless at least one validator is present.
    pub fn put(
        &self,
        url: &str,
        etag: Option<String>,
        last_modified: Option<String>,
        body: &str,
    ) {
        if etag.is_none() && last_modified.is_none() {
            return;
        }
        let entry = CachedResponse {
            url: url.to_string(),
            etag,
            last_modified,
            body: body.to_string(),
        };
        if let Err(err) = self.write_entry(&entry) {
            tracing::debug!(url, %err, "failed to write cache entry");
        }
    }

    fn write_entry(&self, entry: &CachedResponse) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&entry.url);
        let tmp = path.with_extension("tmp");
        let raw = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
