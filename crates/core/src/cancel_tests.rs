// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn starts_uncancelled() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
}

#[test]
fn cancel_is_visible_on_clones() {
    let token = CancellationToken::new();
    let clone = token.clone();

    token.cancel();

    assert!(token.is_cancelled());
    assert!(clone.is_cancelled());
}

#[test]
fn cancel_is_idempotent() {
    let token = CancellationToken::new();
    token.cancel();
    token.cancel();
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn cancelled_resolves_immediately_if_already_cancelled() {
    let token = CancellationToken::new();
    token.cancel();

    tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
        .await
        .expect("cancelled() should not block once already cancelled");
}

#[tokio::test]
async fn cancelled_resolves_after_cancel_is_called() {
    let token = CancellationToken::new();
    let waiter = token.clone();

    let wait = tokio::spawn(async move {
        waiter.cancelled().await;
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    token.cancel();

    tokio::time::timeout(std::time::Duration::from_millis(200), wait)
        .await
        .expect("cancelled() should resolve after cancel()")
        .expect("task should not panic");
}
