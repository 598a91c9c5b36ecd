// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap adapter: drives setup and startup scripts on a fresh server.

mod ssh;

pub use ssh::SshBootstrap;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BootstrapCall, FakeBootstrap};

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Errors from bootstrap operations.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("ssh to {addr} not ready after {waited_secs}s")]
    NotReady { addr: Ipv4Addr, waited_secs: u64 },
    #[error("failed to run ssh: {0}")]
    Spawn(String),
    #[error("script exited with status {status}: {stderr}")]
    ScriptFailed { status: i32, stderr: String },
}

/// Drives scripts on a freshly created server over SSH.
///
/// Host-key verification is disabled: the server was created seconds ago
/// in a provisioning context and its host key is unknown by construction.
#[async_trait]
pub trait BootstrapAdapter: Clone + Send + Sync + 'static {
    /// Retry the TCP/SSH handshake until the server answers or the
    /// timeout elapses.
    async fn wait_ready(&self, addr: Ipv4Addr, timeout: Duration) -> Result<(), BootstrapError>;

    /// Pipe `script` to `bash -s` on the server as `user`, with the given
    /// environment. Returns when the shell command exits; a non-zero exit
    /// is fatal for the server.
    async fn run_script(
        &self,
        addr: Ipv4Addr,
        user: &str,
        script: &[u8],
        env: &[(String, String)],
    ) -> Result<(), BootstrapError>;
}
