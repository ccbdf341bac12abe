// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn file(name: &str, size: u64) -> PendingFile {
    PendingFile {
        path: PathBuf::from(name),
        size_at_enqueue: size,
    }
}

#[test]
fn startup_scan_files_are_served_in_ascending_enqueue_order() {
    let mut q = PendingQueue::new();
    q.push_tail(file("a", 1));
    q.push_tail(file("b", 2));
    q.push_tail(file("c", 3));

    assert_eq!(q.pop().unwrap().path, PathBuf::from("a"));
    assert_eq!(q.pop().unwrap().path, PathBuf::from("b"));
    assert_eq!(q.pop().unwrap().path, PathBuf::from("c"));
}

#[test]
fn new_watch_event_preempts_the_existing_backlog() {
    let mut q = PendingQueue::new();
    q.push_tail(file("old1", 1));
    q.push_tail(file("old2", 1));
    q.push_head(file("brand_new", 1));

    assert_eq!(q.pop().unwrap().path, PathBuf::from("brand_new"));
    assert_eq!(q.pop().unwrap().path, PathBuf::from("old1"));
    assert_eq!(q.pop().unwrap().path, PathBuf::from("old2"));
}

#[test]
fn reenqueue_after_failure_joins_the_back_not_the_front() {
    let mut q = PendingQueue::new();
    q.push_tail(file("waiting", 1));
    q.push_tail(file("failed_retry", 1));

    assert_eq!(q.pop().unwrap().path, PathBuf::from("waiting"));
    assert_eq!(q.pop().unwrap().path, PathBuf::from("failed_retry"));
}

#[test]
fn total_bytes_sums_all_entries() {
    let mut q = PendingQueue::new();
    q.push_tail(file("a", 10));
    q.push_tail(file("b", 20));
    assert_eq!(q.total_bytes(), 30);
}

#[test]
fn remove_drops_matching_entry_only() {
    let mut q = PendingQueue::new();
    q.push_tail(file("a", 1));
    q.push_tail(file("b", 2));
    assert!(q.remove(std::path::Path::new("a")));
    assert_eq!(q.len(), 1);
    assert_eq!(q.pop().unwrap().path, PathBuf::from("b"));
}

#[test]
fn remove_missing_path_is_a_no_op() {
    let mut q = PendingQueue::new();
    q.push_tail(file("a", 1));
    assert!(!q.remove(std::path::Path::new("missing")));
    assert_eq!(q.len(), 1);
}
