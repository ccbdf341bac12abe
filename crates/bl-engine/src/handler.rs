// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The schedule handler (spec §4.F): loads the persisted schedule at
//! startup, acquires a fresh one from GSN, then runs the dispatch loop
//! that fires PLUGIN and SCRIPT entries as they come due.

use crate::error::HandlerError;
use crate::ports::{BusySignal, GsnPeer, JobsObserver, PluginRegistry, ScheduleResponse, TosControl};
use crate::shutdown::{ShutdownOrchestrator, ShutdownRequest};
use bl_core::{Clock, Counters};
use bl_cron::{EntryKind, Schedule, ScheduleEntry};
use bl_storage::ScheduleStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{error, info, warn};

pub struct HandlerConfig {
    pub duty_cycle_mode: bool,
    /// This agent's own plugin-class name, used to scope merges.
    pub origin: String,
    pub max_gsn_connect_wait_minutes: u32,
    pub max_gsn_get_schedule_wait_minutes: u32,
    pub max_next_schedule_wait_minutes: u32,
    pub max_db_resend_runtime_minutes: u32,
    pub hard_shutdown_offset_minutes: u32,
    pub approximate_startup_seconds: u32,
    pub schedule_fetch_poll_interval: Duration,
}

/// Loads, merges, persists, and dispatches the schedule. Generic over
/// the three out-of-scope collaborators (spec §1); `TosControl` stays
/// type-erased like `ShutdownOrchestrator` does.
pub struct ScheduleHandler<C: Clock, G: GsnPeer, P: PluginRegistry, J: JobsObserver> {
    config: HandlerConfig,
    store: ScheduleStore,
    schedule: Mutex<Option<Schedule>>,
    clock: C,
    gsn: Arc<G>,
    plugins: Arc<P>,
    jobs: Arc<J>,
    tos: Arc<dyn TosControl>,
    shutdown: Option<Arc<ShutdownOrchestrator<J>>>,
    counters: Arc<Counters>,
    new_schedule_notify: Notify,
    stop_notify: Notify,
    stopped: AtomicBool,
    /// Set by `set_schedule`, consumed by the next main-loop iteration:
    /// catch any firing within backward tolerance that the new schedule
    /// would otherwise miss (spec §4.F, "on installing a new schedule").
    look_backward_next: AtomicBool,
    started_at: Instant,
}

impl<C: Clock, G: GsnPeer, P: PluginRegistry, J: JobsObserver> ScheduleHandler<C, G, P, J> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: HandlerConfig,
        store: ScheduleStore,
        clock: C,
        gsn: Arc<G>,
        plugins: Arc<P>,
        jobs: Arc<J>,
        tos: Arc<dyn TosControl>,
        shutdown: Option<Arc<ShutdownOrchestrator<J>>>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            config,
            store,
            schedule: Mutex::new(None),
            clock,
            gsn,
            plugins,
            jobs,
            tos,
            shutdown,
            counters,
            new_schedule_notify: Notify::new(),
            stop_notify: Notify::new(),
            stopped: AtomicBool::new(false),
            look_backward_next: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
        self.new_schedule_notify.notify_waiters();
        if let Some(orchestrator) = &self.shutdown {
            orchestrator.stop();
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Reload the persisted schedule, and in duty-cycle mode pre-arm a
    /// conservative wake-up on the TOS node before GSN has even had a
    /// chance to connect.
    pub async fn startup(&self) -> Result<(), HandlerError> {
        if !self.config.duty_cycle_mode {
            self.tos.reset_watchdog(0).await;
        }

        if let Some(schedule) = self.store.load()? {
            *self.schedule.lock() = Some(schedule);
        }

        if self.config.duty_cycle_mode {
            self.preschedule_wakeup().await;
        }

        Ok(())
    }

    async fn preschedule_wakeup(&self) {
        let now_ms = self.clock.now_millis();
        let next_ms = {
            let guard = self.schedule.lock();
            guard.as_ref().and_then(|s| bl_cron::next_fire_after(s, now_ms - 1))
        };
        let Some(next_ms) = next_ms else {
            return;
        };

        let budget_ms = (i64::from(self.config.max_gsn_connect_wait_minutes)
            + i64::from(self.config.max_gsn_get_schedule_wait_minutes)
            + i64::from(self.config.max_next_schedule_wait_minutes)
            + i64::from(self.config.hard_shutdown_offset_minutes))
            * 60_000
            + i64::from(self.config.approximate_startup_seconds) * 1000
            + i64::from(self.jobs.overall_max_runtime_seconds()) * 1000;

        let seconds_from_now = ((next_ms + budget_ms - now_ms) / 1000).max(0) as u32;
        self.tos.next_wakeup(seconds_from_now).await;
    }

    /// Wait for GSN to connect, then poll for a schedule until one
    /// arrives or the wait budgets expire. Meant to run concurrently
    /// with [`Self::run_main_loop`] — the loop may run for a while on
    /// whatever was loaded from disk while this is still waiting.
    pub async fn acquire_schedule(&self) {
        let connect_deadline =
            tokio::time::Instant::now() + Duration::from_secs(u64::from(self.config.max_gsn_connect_wait_minutes) * 60);
        while !self.gsn.is_connected() {
            if self.is_stopped() {
                return;
            }
            if tokio::time::Instant::now() >= connect_deadline {
                warn!("gave up waiting for GSN to connect");
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = self.stop_notify.notified() => return,
            }
        }

        let fetch_deadline = tokio::time::Instant::now()
            + Duration::from_secs(u64::from(self.config.max_gsn_get_schedule_wait_minutes) * 60);
        loop {
            if self.is_stopped() {
                return;
            }

            let creation_time_ms = self.schedule.lock().as_ref().map_or(0, |s| s.creation_time_ms);
            match self.gsn.poll_schedule(creation_time_ms).await {
                Some(ScheduleResponse::Schedule {
                    creation_time_ms,
                    origin,
                    text,
                }) => {
                    if let Err(e) = self.set_schedule(&origin, &text, false, creation_time_ms).await {
                        warn!(error = %e, "GSN-provided schedule rejected");
                    }
                    return;
                }
                Some(ScheduleResponse::NoScheduleAvailable | ScheduleResponse::NoNewSchedule) => return,
                None => {}
            }

            if tokio::time::Instant::now() >= fetch_deadline {
                warn!("gave up waiting for GSN to provide a schedule");
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.schedule_fetch_poll_interval) => {}
                _ = self.stop_notify.notified() => return,
            }
        }
    }

    /// Install `text` as the active schedule, attributed to `origin` at
    /// `creation_time_ms`. `merge` folds `text` into the existing
    /// schedule instead of replacing it outright (spec §4.F).
    pub async fn set_schedule(
        &self,
        origin: &str,
        text: &str,
        merge: bool,
        creation_time_ms: i64,
    ) -> Result<(), HandlerError> {
        let candidate = bl_cron::parse(text, creation_time_ms);
        if !candidate.is_valid() {
            self.counters.increment_error();
            warn!(origin, errors = ?candidate.errors, "candidate schedule rejected, retaining prior schedule");
            return Err(HandlerError::ScheduleRejected(candidate.errors));
        }

        let installed = if merge {
            self.merge_schedule(origin, candidate)?
        } else {
            candidate
        };

        self.store.save(&installed)?;
        let rendered = installed.render();
        *self.schedule.lock() = Some(installed);

        self.gsn.echo_schedule(origin, &rendered, creation_time_ms).await;
        self.look_backward_next.store(true, Ordering::SeqCst);
        self.new_schedule_notify.notify_waiters();
        Ok(())
    }

    /// Fold `candidate` into the current schedule, scoped to `origin`:
    /// SCRIPT rows are updated in place by matching command text;
    /// PLUGIN rows belonging to `origin` are wholesale replaced by
    /// `candidate`'s PLUGIN rows; everything else is untouched. Rejects
    /// the whole merge if `candidate` claims a PLUGIN row for any other
    /// origin.
    fn merge_schedule(&self, origin: &str, candidate: Schedule) -> Result<Schedule, HandlerError> {
        for entry in &candidate.entries {
            if entry.kind == EntryKind::Plugin && entry.plugin_class.as_deref() != Some(origin) {
                return Err(HandlerError::MergeCrossPluginReject {
                    origin: origin.to_string(),
                });
            }
        }

        let existing = self
            .schedule
            .lock()
            .clone()
            .unwrap_or_else(|| Schedule::empty(candidate.creation_time_ms));

        let mut merged_entries: Vec<ScheduleEntry> = Vec::new();

        for existing_entry in existing.entries.iter().filter(|e| e.kind == EntryKind::Script) {
            let replacement = candidate
                .entries
                .iter()
                .find(|e| e.kind == EntryKind::Script && e.command == existing_entry.command);
            merged_entries.push(replacement.cloned().unwrap_or_else(|| existing_entry.clone()));
        }

        merged_entries.extend(
            existing
                .entries
                .iter()
                .filter(|e| e.kind == EntryKind::Plugin && e.plugin_class.as_deref() != Some(origin))
                .cloned(),
        );

        merged_entries.extend(candidate.entries.into_iter().filter(|e| e.kind == EntryKind::Plugin));

        let merged_text = Schedule {
            entries: merged_entries,
            creation_time_ms: candidate.creation_time_ms,
            errors: Vec::new(),
        }
        .render();

        let reparsed = bl_cron::parse(&merged_text, candidate.creation_time_ms);
        if !reparsed.is_valid() {
            return Err(HandlerError::ScheduleRejected(reparsed.errors));
        }
        Ok(reparsed)
    }

    /// Repeatedly sleep until the next entry (or set of entries sharing
    /// the same instant) is due, then dispatch it. In duty-cycle mode, a
    /// next fire that's further out than `max_next_schedule_wait_minutes`
    /// triggers a shutdown attempt instead of a long sleep.
    pub async fn run_main_loop(&self) {
        loop {
            if self.is_stopped() {
                return;
            }

            if self.look_backward_next.swap(false, Ordering::SeqCst) {
                let now_ms = self.clock.now_millis();
                let snapshot = self.schedule.lock().clone();
                if let Some(s) = snapshot {
                    for firing in bl_cron::get_next_schedules(&s, now_ms, true) {
                        if self.is_stopped() {
                            return;
                        }
                        self.dispatch_entry(&s.entries[firing.entry_index]).await;
                    }
                }
            }

            let now_ms = self.clock.now_millis();
            let next_ms = {
                let guard = self.schedule.lock();
                guard.as_ref().and_then(|s| bl_cron::next_fire_after(s, now_ms))
            };
            let max_wait_ms = i64::from(self.config.max_next_schedule_wait_minutes) * 60_000;
            let far_enough = next_ms.map_or(true, |t| t - now_ms > max_wait_ms);

            if far_enough && self.config.duty_cycle_mode {
                self.try_shutdown().await;
                continue;
            }

            let Some(next_ms) = next_ms else {
                if !self.wait_new_schedule_indefinite().await {
                    return;
                }
                continue;
            };

            let delay = Duration::from_millis((next_ms - now_ms).max(0) as u64);
            let woke_for_new_schedule = self.sleep_or_new_schedule(delay).await;
            if self.is_stopped() {
                return;
            }
            if woke_for_new_schedule {
                continue;
            }

            let snapshot = self.schedule.lock().clone();
            let Some(s) = snapshot else { continue };
            for firing in bl_cron::get_next_schedules(&s, next_ms, false) {
                if self.is_stopped() {
                    return;
                }
                self.dispatch_entry(&s.entries[firing.entry_index]).await;
            }
        }
    }

    async fn try_shutdown(&self) {
        let Some(orchestrator) = &self.shutdown else {
            return;
        };

        let uptime = self.started_at.elapsed();
        let full_budget = Duration::from_secs(u64::from(self.config.max_db_resend_runtime_minutes) * 60);
        let resend_budget = full_budget.checked_sub(uptime).unwrap_or_default();

        let req = ShutdownRequest {
            service_window_delay: None,
            max_job_runtime: Some(Duration::from_secs(u64::from(self.jobs.overall_max_runtime_seconds()))),
            resend_budget,
            next_service_window_seconds: None,
            hard_shutdown_offset_seconds: self.config.hard_shutdown_offset_minutes * 60,
        };
        let max_wait_ms = i64::from(self.config.max_next_schedule_wait_minutes) * 60_000;

        let reevaluate = || {
            let now_ms = self.clock.now_millis();
            let guard = self.schedule.lock();
            match guard.as_ref().and_then(|s| bl_cron::next_fire_after(s, now_ms - 1)) {
                Some(t) => t - now_ms < max_wait_ms,
                None => false,
            }
        };

        match orchestrator.run(req, reevaluate).await {
            Ok(outcome) => info!(?outcome, "shutdown attempt finished"),
            Err(e) => error!(error = %e, "shutdown orchestrator failed"),
        }
    }

    async fn sleep_or_new_schedule(&self, dur: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(dur) => false,
            _ = self.new_schedule_notify.notified() => true,
            _ = self.stop_notify.notified() => false,
        }
    }

    async fn wait_new_schedule_indefinite(&self) -> bool {
        tokio::select! {
            _ = self.new_schedule_notify.notified() => true,
            _ = self.stop_notify.notified() => false,
        }
    }

    async fn dispatch_entry(&self, entry: &ScheduleEntry) {
        let result = match entry.kind {
            EntryKind::Plugin => {
                let class = entry.plugin_class.clone().unwrap_or_default();
                self.plugins
                    .invoke(&class, &entry.command, entry.max_runtime_minutes, entry.min_runtime_minutes)
                    .await
            }
            EntryKind::Script => self.spawn_script(entry),
        };

        if let Err(e) = result {
            self.counters.increment_error();
            error!(command = %entry.command, error = %e, "job dispatch failed, continuing with next entry");
        }
    }

    fn spawn_script(&self, entry: &ScheduleEntry) -> Result<(), HandlerError> {
        let words = split_shell_words(&entry.command);
        let Some((program, args)) = words.split_first() else {
            return Ok(());
        };

        let mut cmd = std::process::Command::new(program);
        cmd.args(args);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| HandlerError::Spawn {
            command: entry.command.clone(),
            source,
        })?;
        self.jobs.observe_job(child, entry.command.clone(), entry.max_runtime_minutes);
        Ok(())
    }
}

/// Minimal shell-style word splitting for SCRIPT dispatch: whitespace
/// separates words, single- and double-quoted runs are taken literally
/// (double quotes allow `\"` and `\\` escapes). No nesting, no variable
/// expansion — a SCRIPT row is a fixed argv, not a shell script.
fn split_shell_words(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    current.push(inner);
                }
            }
            '"' => {
                in_word = true;
                while let Some(inner) = chars.next() {
                    if inner == '"' {
                        break;
                    }
                    if inner == '\\' {
                        if let Some(&next) = chars.peek() {
                            if next == '"' || next == '\\' {
                                current.push(next);
                                chars.next();
                                continue;
                            }
                        }
                    }
                    current.push(inner);
                }
            }
            _ => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
