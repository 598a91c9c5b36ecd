// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine loops

use crate::labels::SpecError;
use ghr_adapters::{BootstrapError, CiError, CloudError};
use thiserror::Error;

/// Errors surfaced by ticks and provisioning tasks.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),
    #[error("CI error: {0}")]
    Ci(#[from] CiError),
    #[error("bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("spec error: {0}")]
    Spec(#[from] SpecError),
    #[error("server {0} has no public IPv4 address")]
    MissingIpv4(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("script error: {0}")]
    Script(String),
}
