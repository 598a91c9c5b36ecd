// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn wait_returns_immediately_when_already_set() {
    let terminate = Terminate::new();
    terminate.set();
    assert!(terminate.is_set());
    terminate.wait().await;
}

#[tokio::test]
async fn wait_wakes_on_set_from_clone() {
    let terminate = Terminate::new();
    let other = terminate.clone();

    let waiter = tokio::spawn(async move { other.wait().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    terminate.set();

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should wake")
        .expect("waiter should not panic");
}

#[tokio::test]
async fn set_is_idempotent() {
    let terminate = Terminate::new();
    terminate.set();
    terminate.set();
    assert!(terminate.is_set());
}
