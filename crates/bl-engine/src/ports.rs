// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ports for the collaborators spec.md lists as out of scope: the GSN
//! transport peer, the plugin registry, and the job-runtime observer.
//! `bl-agent` supplies the concrete (and fake, for demos/tests)
//! implementations. `bl_tos::TosTransport` and
//! `bl_transfer::GsnBinaryChannel` are the analogous ports for
//! TOSLink and BinaryTransfer, defined alongside those crates.
//!
//! `BusySignal` and `TosControl` are this crate's own adapters over
//! `bl_transfer::BinaryTransfer<T>` and `bl_tos::TosLink<T>`: they let
//! `ScheduleHandler`/`ShutdownOrchestrator` depend on a fixed, small
//! set of generic parameters instead of threading through whatever
//! transport types the host happens to use.

use crate::error::HandlerError;
use async_trait::async_trait;
use std::process::Child;
use std::sync::Arc;
use std::time::Duration;

/// GSN's schedule-subtype responses (spec §6): `GET_SCHEDULE` yields
/// one of these, or nothing yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleResponse {
    NoScheduleAvailable,
    NoNewSchedule,
    Schedule {
        creation_time_ms: i64,
        origin: String,
        text: String,
    },
}

/// The GSN transport peer (out of scope per spec §1): connection
/// state plus schedule fetch/echo.
#[async_trait]
pub trait GsnPeer: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Issue `GET_SCHEDULE` with the agent's current creation time;
    /// returns GSN's reply once one has arrived since the last call.
    async fn poll_schedule(&self, creation_time_ms: i64) -> Option<ScheduleResponse>;

    /// Echo a newly installed schedule back to GSN.
    async fn echo_schedule(&self, origin: &str, text: &str, creation_time_ms: i64);
}

/// Dynamic dispatch to plugin classes (spec §9: `pluginAction` becomes
/// an explicit async `invoke`).
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    async fn invoke(
        &self,
        class_name: &str,
        command: &str,
        max_runtime_minutes: Option<u32>,
        min_runtime_minutes: Option<u32>,
    ) -> Result<(), HandlerError>;
}

/// Fire-and-observe subprocess tracking (spec §4.F/§4.E).
#[async_trait]
pub trait JobsObserver: Send + Sync {
    /// Hand off a spawned child for tracking.
    fn observe_job(&self, child: Child, command: String, max_runtime_minutes: Option<u32>);

    /// True if every observed job has already reached a terminal state.
    async fn all_jobs_finished(&self) -> bool;

    /// Wait for every observed job to finish. `None` waits
    /// indefinitely, mirroring the original's unbounded `Event.wait()`.
    /// Returns whether all jobs had finished by the time this returned.
    async fn wait_all_finished(&self, timeout: Option<Duration>) -> bool;

    /// Longest `max_runtime_minutes` configured across all schedule
    /// entries, in seconds — used to pad the pre-scheduled wake-up and
    /// the shutdown sequence's job-drain bound so neither cuts off a job
    /// that's allowed to still be running.
    fn overall_max_runtime_seconds(&self) -> u32;
}

/// Whether `BinaryTransfer` has outstanding work, consumed by
/// `ShutdownOrchestrator` to decide when the transfer backlog has
/// quiesced (spec §4.E stages 3-4, §2's shared "busy" signal).
#[async_trait]
pub trait BusySignal: Send + Sync {
    async fn is_busy(&self) -> bool;
}

#[async_trait]
impl<T> BusySignal for bl_transfer::BinaryTransfer<T>
where
    T: bl_transfer::GsnBinaryChannel + Send + Sync + 'static,
{
    async fn is_busy(&self) -> bool {
        bl_transfer::BinaryTransfer::is_busy(self).await
    }
}

/// The subset of `TosLink` operations `ShutdownOrchestrator` drives,
/// plus stopping the background ping task, type-erased so the
/// orchestrator doesn't also carry the TOS transport's generic
/// parameter.
#[async_trait]
pub trait TosControl: Send + Sync {
    async fn service_window(&self, seconds: Option<u32>) -> bool;
    async fn wakeup_query(&self) -> bool;
    fn is_beacon_active(&self) -> bool;
    async fn shutdown(&self, seconds_offset: u32) -> bool;
    /// `NEXT_WAKEUP`: seconds from now at which the node should next
    /// power the station up (the conservative pre-scheduled wake-up
    /// computed at startup, spec §4.F).
    async fn next_wakeup(&self, seconds: u32) -> bool;
    /// `RESET_WATCHDOG`: arm the node's watchdog for `timeout_seconds`.
    /// Sent once with `0` at startup in non-duty mode; the background
    /// ping task re-arms it periodically otherwise.
    async fn reset_watchdog(&self, timeout_seconds: u32) -> bool;
    /// Stop the background watchdog ping; a no-op if already stopped.
    fn stop_ping(&self);
}

/// Pairs a `TosLink` with the shutdown handle for its background ping
/// task, since the two are spawned separately
/// (`bl_tos::spawn_ping_task`) but `ShutdownOrchestrator` needs to stop
/// both through one handle.
pub struct TosControlAdapter<T: bl_tos::TosTransport> {
    link: Arc<bl_tos::TosLink<T>>,
    ping_shutdown: parking_lot::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl<T> TosControlAdapter<T>
where
    T: bl_tos::TosTransport + Send + Sync + 'static,
{
    /// Wrap `link`, spawning its background ping task.
    pub fn new(link: Arc<bl_tos::TosLink<T>>) -> Self {
        let ping_shutdown = bl_tos::spawn_ping_task(link.clone());
        Self {
            link,
            ping_shutdown: parking_lot::Mutex::new(Some(ping_shutdown)),
        }
    }
}

#[async_trait]
impl<T> TosControl for TosControlAdapter<T>
where
    T: bl_tos::TosTransport + Send + Sync + 'static,
{
    async fn service_window(&self, seconds: Option<u32>) -> bool {
        let argument = seconds.unwrap_or(bl_tos::SERVICE_WINDOW_DISABLE);
        self.link
            .send(bl_tos::TosCommand::ServiceWindow(argument))
            .await
    }

    async fn wakeup_query(&self) -> bool {
        self.link.send(bl_tos::TosCommand::WakeupQuery).await
    }

    fn is_beacon_active(&self) -> bool {
        self.link.is_beacon_active()
    }

    async fn shutdown(&self, seconds_offset: u32) -> bool {
        self.link
            .send(bl_tos::TosCommand::Shutdown(seconds_offset))
            .await
    }

    async fn next_wakeup(&self, seconds: u32) -> bool {
        self.link.send(bl_tos::TosCommand::NextWakeup(seconds)).await
    }

    async fn reset_watchdog(&self, timeout_seconds: u32) -> bool {
        self.link
            .send(bl_tos::TosCommand::ResetWatchdog(timeout_seconds))
            .await
    }

    fn stop_ping(&self) {
        if let Some(tx) = self.ping_shutdown.lock().take() {
            let _ = tx.send(());
        }
    }
}
