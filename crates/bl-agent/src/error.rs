// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors specific to standing the agent process up: everything past
//! this point is `bl_engine`'s/`bl_transfer`'s/`bl_tos`'s own error
//! kinds (spec §7).

use bl_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to acquire lock: agent already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schedule handler startup failed: {0}")]
    Handler(#[from] bl_engine::HandlerError),
}
