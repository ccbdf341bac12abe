// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires every engineering core together behind the demo-mode no-op
//! collaborators: `ScheduleHandler` (spec §4.F) driving `TosLink`
//! (§4.B) and `ShutdownOrchestrator` (§4.E), plus an independent
//! `BinaryTransfer` (§4.D) watching the configured directories.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::fakes::{NoopGsnChannel, NoopGsnPeer, NoopPluginRegistry, NoopTosTransport};
use crate::jobs::ProcessJobsObserver;
use crate::lifecycle::Paths;
use bl_core::{Counters, SystemClock};
use bl_engine::{HandlerConfig, ScheduleHandler, ShutdownOrchestrator, TosControl, TosControlAdapter};
use bl_storage::ScheduleStore;
use bl_transfer::{BinaryTransfer, Watch};
use bl_tos::TosLink;
use std::sync::Arc;
use tokio::sync::oneshot;

pub type Handler = ScheduleHandler<SystemClock, NoopGsnPeer, NoopPluginRegistry, ProcessJobsObserver>;
pub type Transfer = BinaryTransfer<NoopGsnChannel>;

/// The running agent process: every background task plus the handle
/// used to request a clean stop.
pub struct App {
    pub handler: Arc<Handler>,
    pub transfer: Arc<Transfer>,
    pub jobs: Arc<ProcessJobsObserver>,
    pub counters: Arc<Counters>,
    pub root: std::path::PathBuf,
    pub watches: Vec<Watch>,
    pub exit_rx: oneshot::Receiver<()>,
}

impl App {
    pub fn build(config: &AgentConfig, paths: &Paths) -> Result<Self, AgentError> {
        let counters = Arc::new(Counters::new());
        let jobs = Arc::new(ProcessJobsObserver::new());

        let tos_link = Arc::new(TosLink::new(NoopTosTransport, counters.clone()));
        let tos: Arc<dyn TosControl> = Arc::new(TosControlAdapter::new(tos_link));

        let watches = config.parsed_watches().map_err(AgentError::Config)?;
        let transfer = Arc::new(BinaryTransfer::new(
            NoopGsnChannel,
            watches.clone(),
            config.root.clone(),
            config.wait_min_for_file(),
            counters.clone(),
        ));

        let (exit_tx, exit_rx) = oneshot::channel();
        let shutdown = Arc::new(ShutdownOrchestrator::new(
            jobs.clone(),
            transfer.clone(),
            tos.clone(),
            exit_tx,
        ));

        let store = ScheduleStore::new(paths.schedule_path.clone());
        let handler_config = HandlerConfig {
            duty_cycle_mode: config.duty_cycle_mode,
            origin: config.origin.clone(),
            max_gsn_connect_wait_minutes: config.max_gsn_connect_wait_minutes,
            max_gsn_get_schedule_wait_minutes: config.max_gsn_get_schedule_wait_minutes,
            max_next_schedule_wait_minutes: config.max_next_schedule_wait_minutes,
            max_db_resend_runtime_minutes: config.max_db_resend_runtime_minutes,
            hard_shutdown_offset_minutes: config.hard_shutdown_offset_minutes,
            approximate_startup_seconds: config.approximate_startup_seconds,
            schedule_fetch_poll_interval: config.schedule_fetch_poll_interval(),
        };

        let handler = Arc::new(ScheduleHandler::new(
            handler_config,
            store,
            SystemClock,
            Arc::new(NoopGsnPeer),
            Arc::new(NoopPluginRegistry),
            jobs.clone(),
            tos,
            Some(shutdown),
            counters.clone(),
        ));

        Ok(Self {
            handler,
            transfer,
            jobs,
            counters,
            root: config.root.clone(),
            watches,
            exit_rx,
        })
    }

    pub fn stop(&self) {
        self.handler.stop();
    }
}
