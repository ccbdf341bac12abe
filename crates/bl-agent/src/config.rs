// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration: loaded from a TOML file (`BL_CONFIG`, falling
//! back to `./backlog-agent.toml`), mirroring the environment keys
//! named in spec §4.F/§4.E/§6.

use bl_core::ConfigError;
use bl_transfer::{StorageKind, Watch};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// This agent's own plugin-class name, used to scope schedule merges.
    pub origin: String,
    #[serde(default)]
    pub duty_cycle_mode: bool,

    #[serde(default = "defaults::max_gsn_connect_wait_minutes")]
    pub max_gsn_connect_wait_minutes: u32,
    #[serde(default = "defaults::max_gsn_get_schedule_wait_minutes")]
    pub max_gsn_get_schedule_wait_minutes: u32,
    #[serde(default = "defaults::max_next_schedule_wait_minutes")]
    pub max_next_schedule_wait_minutes: u32,
    #[serde(default = "defaults::max_db_resend_runtime_minutes")]
    pub max_db_resend_runtime_minutes: u32,
    #[serde(default = "defaults::hard_shutdown_offset_minutes")]
    pub hard_shutdown_offset_minutes: u32,
    #[serde(default = "defaults::approximate_startup_seconds")]
    pub approximate_startup_seconds: u32,
    #[serde(default = "defaults::schedule_fetch_poll_interval_seconds")]
    pub schedule_fetch_poll_interval_seconds: u64,

    /// Root directory file paths in INIT packets are made relative to.
    pub root: PathBuf,
    /// Comma-separated 4-tuples: `relative_path,storage_kind,device_id,date_format`.
    #[serde(default)]
    pub watches: Vec<String>,
    /// Grace period after startup during which `is_busy()` stays true
    /// even with an empty queue, in minutes. `None` disables the grace.
    pub wait_min_for_file_minutes: Option<u64>,

    /// Override of the default schedule file location (under the state
    /// directory otherwise).
    pub schedule_path: Option<PathBuf>,
}

mod defaults {
    pub fn max_gsn_connect_wait_minutes() -> u32 {
        10
    }
    pub fn max_gsn_get_schedule_wait_minutes() -> u32 {
        10
    }
    pub fn max_next_schedule_wait_minutes() -> u32 {
        60
    }
    pub fn max_db_resend_runtime_minutes() -> u32 {
        30
    }
    pub fn hard_shutdown_offset_minutes() -> u32 {
        2
    }
    pub fn approximate_startup_seconds() -> u32 {
        30
    }
    pub fn schedule_fetch_poll_interval_seconds() -> u64 {
        30
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn schedule_fetch_poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_fetch_poll_interval_seconds)
    }

    pub fn wait_min_for_file(&self) -> Option<Duration> {
        self.wait_min_for_file_minutes.map(|m| Duration::from_secs(m * 60))
    }

    /// Parse every configured watch spec, per §6: `relative_path,storage_kind,device_id,date_format`,
    /// empty fields taking their defaults.
    pub fn parsed_watches(&self) -> Result<Vec<Watch>, ConfigError> {
        self.watches.iter().map(|spec| parse_watch(spec)).collect()
    }
}

fn parse_watch(spec: &str) -> Result<Watch, ConfigError> {
    let mut fields = spec.splitn(4, ',');
    let relative_path = fields.next().unwrap_or("").trim();
    let storage_kind = fields.next().unwrap_or("").trim();
    let device_id = fields.next().unwrap_or("").trim();
    let date_format = fields.next().unwrap_or("").trim();

    let relative_path = if relative_path.is_empty() { "." } else { relative_path };
    let storage_kind = match storage_kind.to_ascii_uppercase().as_str() {
        "" | "FS" => StorageKind::Fs,
        "DB" => StorageKind::Db,
        other => {
            return Err(ConfigError::MalformedWatch(format!(
                "unknown storage kind {other:?} in watch spec {spec:?}"
            )))
        }
    };
    let device_id = if device_id.is_empty() {
        0
    } else {
        device_id
            .parse::<u32>()
            .map_err(|_| ConfigError::MalformedWatch(format!("bad device_id in watch spec {spec:?}")))?
    };
    let date_format = if date_format.is_empty() {
        "yyyy-MM-dd".to_string()
    } else {
        date_format.to_string()
    };

    Ok(Watch {
        relative_path: relative_path.to_string(),
        storage_kind,
        device_id,
        date_format,
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
