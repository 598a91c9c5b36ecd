// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH bootstrap using the system `ssh` binary.

use super::{BootstrapAdapter, BootstrapError};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const RETRY_INTERVAL: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT_SECS: u32 = 5;

/// Bootstrap driver shelling out to `ssh`, always connecting as root.
#[derive(Clone, Default)]
pub struct SshBootstrap;

impl SshBootstrap {
    pub fn new() -> Self {
        Self
    }

    fn ssh_command(addr: Ipv4Addr, remote_cmd: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-q")
            .arg("-o")
            .arg("StrictHostKeyChecking no")
            .arg("-o")
            .arg("UserKnownHostsFile /dev/null")
            .arg("-o")
            .arg(format!("ConnectTimeout {CONNECT_TIMEOUT_SECS}"))
            .arg(format!("root@{addr}"))
            .arg(remote_cmd);
        cmd
    }
}

/// Quote a value for use inside a POSIX shell command line.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Assemble the remote command: environment assignments, then `bash -s`,
/// via `sudo -u` for a non-root user.
fn remote_script_command(user: &str, env: &[(String, String)]) -> String {
    let assignments: Vec<String> = env
        .iter()
        .map(|(key, value)| format!("{key}={}", sh_quote(value)))
        .collect();
    let assignments = assignments.join(" ");

    let mut cmd = String::new();
    if user != "root" {
        cmd.push_str(&format!("sudo -u {user} "));
    }
    if !assignments.is_empty() {
        cmd.push_str(&assignments);
        cmd.push(' ');
    }
    cmd.push_str("bash -s");
    cmd
}

#[async_trait]
impl BootstrapAdapter for SshBootstrap {
    async fn wait_ready(&self, addr: Ipv4Addr, timeout: Duration) -> Result<(), BootstrapError> {
        let started = std::time::Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let status = Self::ssh_command(addr, "hostname")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;

            match status {
                Ok(status) if status.success() => return Ok(()),
                Ok(_) | Err(_) => {
                    tracing::debug!(%addr, attempt, "ssh not ready yet");
                }
            }

            if started.elapsed() >= timeout {
                return Err(BootstrapError::NotReady {
                    addr,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    async fn run_script(
        &self,
        addr: Ipv4Addr,
        user: &str,
        script: &[u8],
        env: &[(String, String)],
    ) -> Result<(), BootstrapError> {
        let remote_cmd = remote_script_command(user, env);

        let mut child = Self::ssh_command(addr, &remote_cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BootstrapError::Spawn(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script)
                .await
                .map_err(|e| BootstrapError::Spawn(e.to_string()))?;
            // Close stdin so bash -s sees EOF.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BootstrapError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(10)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(BootstrapError::ScriptFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: tail,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
