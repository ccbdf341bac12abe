// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single cron time field: a comma-separated list of atoms, ranges,
//! steps, and wildcards, each sanity-checked against the field's
//! admissible range by endpoint (not just by atom value).

use crate::error::ScheduleParseError;
use serde::{Deserialize, Serialize};

/// One sub-expression of a cron field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldExpr {
    Wildcard,
    Atom(u32),
    Range(u32, u32),
    /// `base/step`, where base is either a wildcard or a range.
    Step { base: Box<FieldExpr>, step: u32 },
}

/// A full field: one or more comma-separated sub-expressions, plus the
/// field's own admissible range (needed to resolve `*/n` wildcard steps
/// to the right starting point).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronField {
    pub exprs: Vec<FieldExpr>,
    pub min: u32,
    pub max: u32,
}

impl CronField {
    /// Parse and sanity-check a field against `[min, max]`.
    pub fn parse(
        text: &str,
        field_name: &'static str,
        min: u32,
        max: u32,
        line: usize,
    ) -> Result<Self, ScheduleParseError> {
        let mut exprs = Vec::new();
        for part in text.split(',') {
            let expr = parse_expr(part, field_name, line)?;
            validate_expr(&expr, field_name, min, max, line)?;
            exprs.push(expr);
        }
        if exprs.is_empty() {
            return Err(ScheduleParseError::MalformedField {
                line,
                field: field_name,
                text: text.to_string(),
            });
        }
        Ok(Self { exprs, min, max })
    }

    /// Does `value` satisfy any sub-expression of this field?
    pub fn matches(&self, value: u32) -> bool {
        self.exprs.iter().any(|e| expr_matches(e, value, self.min))
    }

    pub fn render(&self) -> String {
        self.exprs
            .iter()
            .map(render_expr)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse_expr(
    part: &str,
    field_name: &'static str,
    line: usize,
) -> Result<FieldExpr, ScheduleParseError> {
    let part = part.trim();
    if part.is_empty() {
        return Err(ScheduleParseError::MalformedField {
            line,
            field: field_name,
            text: part.to_string(),
        });
    }

    if let Some((base_text, step_text)) = part.split_once('/') {
        let step: u32 = step_text.parse().map_err(|_| ScheduleParseError::MalformedField {
            line,
            field: field_name,
            text: part.to_string(),
        })?;
        if step == 0 {
            return Err(ScheduleParseError::MalformedField {
                line,
                field: field_name,
                text: part.to_string(),
            });
        }
        let base = parse_base(base_text, field_name, line)?;
        return Ok(FieldExpr::Step {
            base: Box::new(base),
            step,
        });
    }

    parse_base(part, field_name, line)
}

fn parse_base(
    text: &str,
    field_name: &'static str,
    line: usize,
) -> Result<FieldExpr, ScheduleParseError> {
    if text == "*" {
        return Ok(FieldExpr::Wildcard);
    }
    if let Some((lo, hi)) = text.split_once('-') {
        let lo: u32 = lo.parse().map_err(|_| ScheduleParseError::MalformedField {
            line,
            field: field_name,
            text: text.to_string(),
        })?;
        let hi: u32 = hi.parse().map_err(|_| ScheduleParseError::MalformedField {
            line,
            field: field_name,
            text: text.to_string(),
        })?;
        return Ok(FieldExpr::Range(lo, hi));
    }
    let atom: u32 = text.parse().map_err(|_| ScheduleParseError::MalformedField {
        line,
        field: field_name,
        text: text.to_string(),
    })?;
    Ok(FieldExpr::Atom(atom))
}

/// Validate every endpoint of `expr` lies within `[min, max]`.
fn validate_expr(
    expr: &FieldExpr,
    field_name: &'static str,
    min: u32,
    max: u32,
    line: usize,
) -> Result<(), ScheduleParseError> {
    let check = |v: u32| -> Result<(), ScheduleParseError> {
        if v < min || v > max {
            Err(ScheduleParseError::FieldOutOfRange {
                line,
                field: field_name,
                value: v,
                min,
                max,
            })
        } else {
            Ok(())
        }
    };
    match expr {
        FieldExpr::Wildcard => Ok(()),
        FieldExpr::Atom(v) => check(*v),
        FieldExpr::Range(lo, hi) => {
            check(*lo)?;
            check(*hi)?;
            if lo > hi {
                return Err(ScheduleParseError::MalformedField {
                    line,
                    field: field_name,
                    text: format!("{lo}-{hi}"),
                });
            }
            Ok(())
        }
        FieldExpr::Step { base, step } => {
            if *step == 0 || *step as u64 >= (max - min + 1) as u64 {
                return Err(ScheduleParseError::FieldOutOfRange {
                    line,
                    field: field_name,
                    value: *step,
                    min: 1,
                    max: max - min + 1,
                });
            }
            validate_expr(base, field_name, min, max, line)
        }
    }
}

fn expr_matches(expr: &FieldExpr, value: u32, field_min: u32) -> bool {
    match expr {
        FieldExpr::Wildcard => true,
        FieldExpr::Atom(v) => *v == value,
        FieldExpr::Range(lo, hi) => value >= *lo && value <= *hi,
        FieldExpr::Step { base, step } => {
            let (lo, hi) = match base.as_ref() {
                FieldExpr::Wildcard => (field_min, u32::MAX),
                FieldExpr::Range(lo, hi) => (*lo, *hi),
                _ => return false,
            };
            value >= lo && value <= hi && (value - lo) % step == 0
        }
    }
}

fn render_expr(expr: &FieldExpr) -> String {
    match expr {
        FieldExpr::Wildcard => "*".to_string(),
        FieldExpr::Atom(v) => v.to_string(),
        FieldExpr::Range(lo, hi) => format!("{lo}-{hi}"),
        FieldExpr::Step { base, step } => format!("{}/{}", render_expr(base), step),
    }
}

#[cfg(test)]
#[path = "field_tests.rs"]
mod tests;
