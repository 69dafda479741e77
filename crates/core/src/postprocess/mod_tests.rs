// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_outcome_has_no_artifacts_or_notes() {
    let outcome = PostprocessOutcome::empty();
    assert!(outcome.success);
    assert!(outcome.error.is_none());
    assert!(outcome.artifacts.is_empty());
    assert!(outcome.notes.is_empty());
}

#[test]
fn failed_outcome_carries_its_reason() {
    let outcome = PostprocessOutcome::failed("missing output file");
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("missing output file"));
}
