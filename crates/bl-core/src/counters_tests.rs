// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn starts_at_zero() {
    let c = Counters::new();
    assert_eq!(c.error_count(), 0);
    assert_eq!(c.exception_count(), 0);
}

#[test]
fn increments_are_independent() {
    let c = Counters::new();
    c.increment_error();
    c.increment_error();
    c.increment_exception();
    assert_eq!(c.error_count(), 2);
    assert_eq!(c.exception_count(), 1);
}
