// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the agent binary.

use bl_core::ConfigError;
use std::path::PathBuf;

/// Resolve state directory: `BL_STATE_DIR` > `XDG_STATE_HOME/backlog-agent`
/// > `~/.local/state/backlog-agent`.
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("BL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("backlog-agent"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/backlog-agent"))
}

/// Path to the TOML config file: `BL_CONFIG`, or `./backlog-agent.toml`.
pub fn config_path() -> PathBuf {
    std::env::var("BL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("backlog-agent.toml"))
}
