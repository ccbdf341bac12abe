// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bl_agent::app::App;
use bl_agent::config::AgentConfig;
use bl_agent::lifecycle::{self, Paths};
use bl_agent::{env, error::AgentError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), AgentError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = env::config_path();
    let config = AgentConfig::load(&config_path)?;

    let state_dir = config
        .schedule_path
        .as_ref()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .map_or_else(|| env::state_dir().map_err(AgentError::Config), Ok)?;
    let paths = Paths::new(state_dir);
    let state = lifecycle::startup(paths.clone())?;

    let app = App::build(&config, &paths)?;
    let App {
        handler,
        transfer,
        root,
        watches,
        mut exit_rx,
        ..
    } = app;

    handler.startup().await.map_err(|e| {
        tracing::error!(error = %e, "schedule handler startup failed");
        AgentError::Handler(e)
    })?;

    let startup_files = bl_transfer::scan_startup_files(&watches, &root).unwrap_or_default();
    transfer.seed_from_startup_scan(startup_files).await;
    let _watcher_shutdown = bl_transfer::spawn_watcher(transfer.clone(), root.clone());
    let _resend_shutdown = bl_transfer::spawn_resend_watchdog(transfer.clone());

    let handler_for_loop = handler.clone();
    let main_loop = tokio::spawn(async move { handler_for_loop.run_main_loop().await });

    let handler_for_acquire = handler.clone();
    let acquire = tokio::spawn(async move { handler_for_acquire.acquire_schedule().await });

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        _ = &mut exit_rx => tracing::info!("duty-cycle shutdown sequence signalled exit"),
    }

    handler.stop();
    let _ = main_loop.await;
    let _ = acquire.await;
    state.shutdown();

    Ok(())
}
