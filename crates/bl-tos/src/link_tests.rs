// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::wire::{decode_packet, WAKEUP_BEACON, WAKEUP_SERVICE};
use async_trait::async_trait;
use std::sync::atomic::AtomicUsize;

struct FakeTransport {
    sent: Mutex<Vec<(u8, u32)>>,
    send_count: AtomicUsize,
}

impl FakeTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            send_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TosTransport for FakeTransport {
    async fn send_packet(&self, packet: &[u8]) -> Result<(), crate::error::TosError> {
        self.send_count.fetch_add(1, Ordering::Relaxed);
        let (command, argument) = decode_packet(packet)?;
        self.sent.lock().push((command, argument));
        Ok(())
    }
}

fn counters() -> Arc<Counters> {
    Arc::new(Counters::new())
}

#[tokio::test(start_paused = true)]
async fn send_succeeds_when_ack_arrives_promptly() {
    let link = Arc::new(TosLink::new(FakeTransport::new(), counters()));
    let link2 = link.clone();

    let send_fut = tokio::spawn(async move { link2.send(TosCommand::WakeupQuery).await });
    tokio::task::yield_now().await;
    link.on_packet(TosCommand::WakeupQuery.code(), 0);

    assert!(send_fut.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn send_fails_after_exhausting_retries() {
    let link = Arc::new(TosLink::new(FakeTransport::new(), counters()));
    let ok = link.send(TosCommand::NetStatus).await;
    assert!(!ok);
}

#[tokio::test(start_paused = true)]
async fn duplicate_ack_after_success_is_harmless() {
    let link = Arc::new(TosLink::new(FakeTransport::new(), counters()));
    let link2 = link.clone();

    let send_fut = tokio::spawn(async move { link2.send(TosCommand::WakeupQuery).await });
    tokio::task::yield_now().await;
    link.on_packet(TosCommand::WakeupQuery.code(), 0);
    assert!(send_fut.await.unwrap());

    // A second, stale ack for the same command must not panic or wedge state.
    link.on_packet(TosCommand::WakeupQuery.code(), 0);
}

#[test]
fn beacon_transition_in_sets_flag_and_notifies() {
    let link = TosLink::new(FakeTransport::new(), counters());
    assert!(!link.is_beacon_active());

    link.on_packet(TosCommand::WakeupQuery.code(), WAKEUP_BEACON);
    assert!(link.is_beacon_active());
    assert!(link.node_wakeup_flags().is_beacon());
}

#[test]
fn beacon_transition_out_clears_flag() {
    let link = TosLink::new(FakeTransport::new(), counters());
    link.on_packet(TosCommand::WakeupQuery.code(), WAKEUP_BEACON);
    assert!(link.is_beacon_active());

    link.on_packet(TosCommand::WakeupQuery.code(), WAKEUP_SERVICE);
    assert!(!link.is_beacon_active());
}

#[test]
fn identical_wakeup_query_argument_is_a_no_op() {
    let link = TosLink::new(FakeTransport::new(), counters());
    link.on_packet(TosCommand::WakeupQuery.code(), WAKEUP_SERVICE);
    assert!(!link.is_beacon_active());
    // Repeating the same state must not toggle anything.
    link.on_packet(TosCommand::WakeupQuery.code(), WAKEUP_SERVICE);
    assert!(!link.is_beacon_active());
}

#[tokio::test]
async fn offline_link_never_calls_transport() {
    let link = TosLink::new(FakeTransport::new(), counters());
    link.set_online(false);
    assert!(!link.send(TosCommand::NetStatus).await);
}
