// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Half-duplex request/ack channel to the TOS micro-controller: one
//! outstanding command at a time, bounded retries, and a background
//! watchdog ping.

use crate::transport::TosTransport;
use crate::wire::{encode_command, NodeWakeupFlags, TosCommand, PING_INTERVAL_SEC, WATCHDOG_TIMEOUT_SEC};
use bl_core::Counters;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, error, info};

const ACK_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_SEND_ATTEMPTS: u32 = 5;

/// Request/ack channel to the TOS node, generic over the host-provided
/// transport.
pub struct TosLink<T: TosTransport> {
    transport: T,
    online: AtomicBool,
    send_lock: tokio::sync::Mutex<()>,
    outstanding_cmd: Mutex<Option<u8>>,
    last_acked_cmd: Mutex<Option<u8>>,
    ack_notify: Notify,
    node_wakeup_flags: Mutex<NodeWakeupFlags>,
    beacon_active: AtomicBool,
    /// Fires whenever the node transitions into or out of BEACON, so a
    /// caller waiting to act on the beacon state (inhibit or resume
    /// shutdown) can be woken rather than poll.
    pub beacon_changed: Notify,
    counters: Arc<Counters>,
}

impl<T: TosTransport> TosLink<T> {
    pub fn new(transport: T, counters: Arc<Counters>) -> Self {
        Self {
            transport,
            online: AtomicBool::new(true),
            send_lock: tokio::sync::Mutex::new(()),
            outstanding_cmd: Mutex::new(None),
            last_acked_cmd: Mutex::new(None),
            ack_notify: Notify::new(),
            node_wakeup_flags: Mutex::new(NodeWakeupFlags::default()),
            beacon_active: AtomicBool::new(false),
            beacon_changed: Notify::new(),
            counters,
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn is_beacon_active(&self) -> bool {
        self.beacon_active.load(Ordering::Relaxed)
    }

    pub fn node_wakeup_flags(&self) -> NodeWakeupFlags {
        *self.node_wakeup_flags.lock()
    }

    /// Send `cmd`, serialized against any other in-flight send, waiting
    /// up to [`ACK_TIMEOUT`] for a matching ack and retrying up to
    /// [`MAX_SEND_ATTEMPTS`] times total. Returns whether the node ever
    /// acked.
    pub async fn send(&self, cmd: TosCommand) -> bool {
        if !self.is_online() {
            return false;
        }

        let _guard = self.send_lock.lock().await;
        *self.outstanding_cmd.lock() = Some(cmd.code());
        let packet = encode_command(cmd);

        for attempt in 1..=MAX_SEND_ATTEMPTS {
            debug!(cmd = cmd.code(), argument = cmd.argument(), attempt, "snd");
            if let Err(e) = self.transport.send_packet(&packet).await {
                self.counters.increment_exception();
                error!(error = %e, cmd = cmd.code(), "failed to send TOS command");
                *self.outstanding_cmd.lock() = None;
                return false;
            }

            let acked = tokio::time::timeout(ACK_TIMEOUT, self.wait_for_ack()).await.is_ok();
            if acked {
                return true;
            }

            if attempt == MAX_SEND_ATTEMPTS {
                self.counters.increment_error();
                error!(
                    cmd = cmd.code(),
                    "no answer for TOS command received from TOS node"
                );
                *self.outstanding_cmd.lock() = None;
                return false;
            }
            info!(cmd = cmd.code(), attempt, "resend command to TOS node");
        }

        false
    }

    /// Wait until `outstanding_cmd` is cleared by [`Self::on_packet`].
    async fn wait_for_ack(&self) {
        loop {
            if self.outstanding_cmd.lock().is_none() {
                return;
            }
            self.ack_notify.notified().await;
        }
    }

    /// Dispatch an incoming control-command packet: resolve it against
    /// the outstanding command (ack / duplicate ack / mismatch), then
    /// apply any spontaneous state it carries (currently only
    /// `WAKEUP_QUERY` responses).
    pub fn on_packet(&self, command: u8, argument: u32) {
        debug!(command, argument, "rcv");

        {
            let mut outstanding = self.outstanding_cmd.lock();
            if *outstanding == Some(command) {
                *outstanding = None;
                *self.last_acked_cmd.lock() = Some(command);
                drop(outstanding);
                debug!(command, "TOS packet acknowledge received");
                self.ack_notify.notify_one();
            } else if outstanding.is_some() {
                if *self.last_acked_cmd.lock() == Some(command) {
                    debug!(command, "TOS packet acknowledge already received");
                } else {
                    let expected = *outstanding;
                    drop(outstanding);
                    self.counters.increment_error();
                    error!(
                        received = command,
                        expected = ?expected,
                        "received TOS message type does not match the sent command type"
                    );
                }
            }
        }

        if command == TosCommand::WakeupQuery.code() {
            self.handle_wakeup_query(argument);
        }
    }

    fn handle_wakeup_query(&self, node_state: u32) {
        let new_flags = NodeWakeupFlags(node_state);
        let mut flags = self.node_wakeup_flags.lock();
        if new_flags == *flags {
            return;
        }
        let was_beacon = flags.is_beacon();
        *flags = new_flags;
        drop(flags);

        let mut states = String::new();
        if new_flags.is_scheduled() {
            states.push_str("SCHEDULE ");
        }
        if new_flags.is_service() {
            states.push_str("SERVICE ");
        }
        if new_flags.is_beacon() {
            states.push_str("BEACON ");
        }
        if new_flags.is_node_reboot() {
            states.push_str("NODE_REBOOT");
        }
        if !states.is_empty() {
            info!(states = states.trim(), "TinyNode wake-up states changed");
        }

        let now_beacon = new_flags.is_beacon();
        if now_beacon != was_beacon {
            self.beacon_active.store(now_beacon, Ordering::Relaxed);
            self.beacon_changed.notify_waiters();
        }
    }
}

/// Spawn the background watchdog ping: `RESET_WATCHDOG` every
/// [`PING_INTERVAL_SEC`] seconds with argument [`WATCHDOG_TIMEOUT_SEC`].
/// Returns a handle that stops the task when dropped or sent to.
pub fn spawn_ping_task<T>(link: Arc<TosLink<T>>) -> oneshot::Sender<()>
where
    T: TosTransport + Send + Sync + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SEC));
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    link.send(TosCommand::ResetWatchdog(WATCHDOG_TIMEOUT_SEC)).await;
                }
                _ = &mut shutdown_rx => {
                    return;
                }
            }
        }
    });

    shutdown_tx
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
