// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external I/O: the cloud, the CI provider, and SSH.

pub mod bootstrap;
pub mod ci;
pub mod cloud;
mod http;

pub use bootstrap::{BootstrapAdapter, BootstrapError, SshBootstrap};
pub use ci::{CiAdapter, CiError, GithubCi, HttpCache, RateLimit};
pub use cloud::{CloudAdapter, CloudError, CreateServerRequest, HetznerCloud};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use bootstrap::{BootstrapCall, FakeBootstrap};
#[cfg(any(test, feature = "test-support"))]
pub use ci::{CiCall, FakeCi};
#[cfg(any(test, feature = "test-support"))]
pub use cloud::{CloudCall, FakeCloud};
