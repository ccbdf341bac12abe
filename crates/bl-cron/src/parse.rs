// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parse a schedule file: one cron row per non-empty line, five
//! whitespace-separated time fields followed by a `PLUGIN`/`SCRIPT`
//! command portion.
//!
//! Grounded on `ScheduleHandler.py`'s `_getSpecialParameter`: the three
//! optional `name=INTEGER` parameters may appear anywhere in the command
//! portion, as bare decimal digits terminated by whitespace or
//! end-of-string.

use crate::entry::{EntryKind, Schedule, ScheduleEntry};
use crate::error::ScheduleParseError;
use crate::field::CronField;

/// Parse `text` into a `Schedule`. Never fails outright: malformed rows
/// are collected into `Schedule::errors` and dropped; the remaining
/// valid rows still populate `Schedule::entries`.
pub fn parse(text: &str, creation_time_ms: i64) -> Schedule {
    let mut schedule = Schedule::empty(creation_time_ms);

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_row(trimmed, line_no) {
            Ok(entry) => schedule.entries.push(entry),
            Err(e) => schedule.errors.push(e),
        }
    }

    schedule
}

fn parse_row(line: &str, line_no: usize) -> Result<ScheduleEntry, ScheduleParseError> {
    let mut tokens = line.splitn(6, char::is_whitespace);
    let minute_s = tokens.next().ok_or(ScheduleParseError::TooFewFields {
        line: line_no,
        tokens: 0,
    })?;
    let hour_s = tokens.next().ok_or(ScheduleParseError::TooFewFields {
        line: line_no,
        tokens: 1,
    })?;
    let dom_s = tokens.next().ok_or(ScheduleParseError::TooFewFields {
        line: line_no,
        tokens: 2,
    })?;
    let month_s = tokens.next().ok_or(ScheduleParseError::TooFewFields {
        line: line_no,
        tokens: 3,
    })?;
    let dow_s = tokens.next().ok_or(ScheduleParseError::TooFewFields {
        line: line_no,
        tokens: 4,
    })?;
    let command_portion = tokens.next().unwrap_or("").trim();

    let minute = CronField::parse(minute_s, "minute", 0, 59, line_no)?;
    let hour = CronField::parse(hour_s, "hour", 0, 23, line_no)?;
    let dom = CronField::parse(dom_s, "dom", 1, 31, line_no)?;
    let month = CronField::parse(month_s, "month", 1, 12, line_no)?;
    let dow = CronField::parse(dow_s, "dow", 0, 7, line_no)?;

    let mut cmd_tokens = command_portion.split_whitespace();
    let kind_word = cmd_tokens.next().unwrap_or("");
    let kind = match kind_word.to_ascii_uppercase().as_str() {
        "PLUGIN" => EntryKind::Plugin,
        "SCRIPT" => EntryKind::Script,
        _ => {
            return Err(ScheduleParseError::UnknownKind {
                line: line_no,
                found: kind_word.to_string(),
            })
        }
    };

    let plugin_class = if kind == EntryKind::Plugin {
        Some(
            cmd_tokens
                .next()
                .ok_or(ScheduleParseError::MissingPluginClass { line: line_no })?
                .to_string(),
        )
    } else {
        None
    };

    let mut backward_tolerance_minutes = None;
    let mut max_runtime_minutes = None;
    let mut min_runtime_minutes = None;
    let mut remaining = Vec::new();

    for tok in cmd_tokens {
        if let Some(value) = extract_special_param(tok, "backward_tolerance_minutes") {
            backward_tolerance_minutes = Some(value);
            continue;
        }
        if let Some(value) = extract_special_param(tok, "max_runtime_minutes") {
            max_runtime_minutes = Some(value);
            continue;
        }
        if let Some(value) = extract_special_param(tok, "min_runtime_minutes") {
            min_runtime_minutes = Some(value);
            continue;
        }
        remaining.push(tok);
    }

    Ok(ScheduleEntry {
        minute,
        hour,
        dom,
        month,
        dow,
        kind,
        plugin_class,
        command: remaining.join(" "),
        backward_tolerance_minutes,
        max_runtime_minutes,
        min_runtime_minutes,
        raw_text: line.to_string(),
    })
}

/// `name=INTEGER`, where INTEGER is bare decimal digits. Returns `None`
/// if `tok` isn't this parameter at all (not an error — just means the
/// caller should try the next candidate name or treat it as a plain
/// command token).
fn extract_special_param(tok: &str, name: &str) -> Option<u32> {
    let value = tok.strip_prefix(name)?.strip_prefix('=')?;
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
