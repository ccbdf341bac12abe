// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The parsed schedule: a sequence of entries plus a creation time.

use crate::error::ScheduleParseError;
use crate::field::CronField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Plugin,
    Script,
}

/// A single crontab-style row, fully decomposed after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub minute: CronField,
    pub hour: CronField,
    pub dom: CronField,
    pub month: CronField,
    pub dow: CronField,
    pub kind: EntryKind,
    /// Set only for `EntryKind::Plugin`.
    pub plugin_class: Option<String>,
    /// Free-form argv text: PLUGIN's extra args, or SCRIPT's full command line.
    pub command: String,
    pub backward_tolerance_minutes: Option<u32>,
    pub max_runtime_minutes: Option<u32>,
    pub min_runtime_minutes: Option<u32>,
    /// Original rendered text of the row, retained for merge/echo.
    pub raw_text: String,
}

/// Ordered sequence of entries plus a creation time (ms since epoch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
    pub creation_time_ms: i64,
    /// Row-level parse errors collected while building this schedule.
    /// A non-empty list means the caller should reject the whole
    /// candidate and retain the prior schedule (spec §4.A/§4.F).
    pub errors: Vec<ScheduleParseError>,
}

impl Schedule {
    pub fn empty(creation_time_ms: i64) -> Self {
        Self {
            entries: Vec::new(),
            creation_time_ms,
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Render back to the raw text representation: one retained raw
    /// line per entry, joined by newlines. `Parse(Render(s)) == s`
    /// modulo whitespace, since each entry's `raw_text` is preserved
    /// verbatim from parsing.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.raw_text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
