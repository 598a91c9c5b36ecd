// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config_in(dir: &std::path::Path) -> Config {
    let yaml = format!(
        "config:\n  github_token: t1\n  github_repository: acme/widgets\n  hetzner_token: t2\n  scripts: {}\n  cache_dir: {}\n",
        dir.display(),
        dir.join("cache").display(),
    );
    Config::from_yaml(&yaml).expect("valid config")
}

#[test]
fn lock_is_exclusive_per_cache_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let first = acquire_lock(&config).expect("first lock");
    let second = acquire_lock(&config);
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));

    drop(first);
    acquire_lock(&config).expect("lock again after release");
}

#[test]
fn key_names_are_content_derived() {
    let a = key_name("ssh-ed25519 AAAA... ci@host");
    let b = key_name("ssh-ed25519 AAAA... ci@host");
    let c = key_name("ssh-ed25519 BBBB... other@host");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("ghr-"));
}
