// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake bootstrap adapter for testing

use super::{BootstrapAdapter, BootstrapError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// Recorded bootstrap call.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapCall {
    WaitReady {
        addr: Ipv4Addr,
    },
    RunScript {
        addr: Ipv4Addr,
        user: String,
        script: Vec<u8>,
        env: Vec<(String, String)>,
    },
}

struct FakeBootstrapState {
    calls: Vec<BootstrapCall>,
    ready: bool,
    script_failures_left: u32,
}

/// Fake bootstrap driver: succeeds by default, programmable to fail.
#[derive(Clone)]
pub struct FakeBootstrap {
    inner: Arc<Mutex<FakeBootstrapState>>,
}

impl Default for FakeBootstrap {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBootstrapState {
                calls: Vec::new(),
                ready: true,
                script_failures_left: 0,
            })),
        }
    }
}

impl FakeBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `wait_ready` report the server as unreachable.
    pub fn set_unreachable(&self) {
        self.inner.lock().ready = false;
    }

    /// Fail the next `n` script executions with a non-zero exit.
    pub fn fail_scripts(&self, n: u32) {
        self.inner.lock().script_failures_left = n;
    }

    pub fn calls(&self) -> Vec<BootstrapCall> {
        self.inner.lock().calls.clone()
    }

    /// Environments of every recorded `run_script`, in call order.
    pub fn script_envs(&self) -> Vec<Vec<(String, String)>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                BootstrapCall::RunScript { env, .. } => Some(env.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BootstrapAdapter for FakeBootstrap {
    async fn wait_ready(&self, addr: Ipv4Addr, _timeout: Duration) -> Result<(), BootstrapError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BootstrapCall::WaitReady { addr });
        if inner.ready {
            Ok(())
        } else {
            Err(BootstrapError::NotReady {
                addr,
                waited_secs: 0,
            })
        }
    }

    async fn run_script(
        &self,
        addr: Ipv4Addr,
        user: &str,
        script: &[u8],
        env: &[(String, String)],
    ) -> Result<(), BootstrapError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BootstrapCall::RunScript {
            addr,
            user: user.to_string(),
            script: script.to_vec(),
            env: env.to_vec(),
        });
        if inner.script_failures_left > 0 {
            inner.script_failures_left -= 1;
            return Err(BootstrapError::ScriptFailed {
                status: 1,
                stderr: "fake failure".to_string(),
            });
        }
        Ok(())
    }
}
