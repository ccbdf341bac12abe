// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bl_cron::ScheduleParseError;
use bl_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("candidate schedule rejected: {0:?}")]
    ScheduleRejected(Vec<ScheduleParseError>),

    #[error("merge rejected: incoming PLUGIN entry does not reference origin {origin:?}")]
    MergeCrossPluginReject { origin: String },

    #[error("schedule store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to spawn subprocess for {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin invocation failed: {0}")]
    PluginInvocation(String),
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("exit signal receiver was already dropped")]
    ExitSignalDropped,
}
