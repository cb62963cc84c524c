//! Cron schedule handling, with crontab(5) semantics.
//!
//! The process never schedules itself: an external cron daemon re-invokes it.
//! This module validates the expression, reports the next occurrence, and
//! renders the one-line crontab that the daemon reads.

use crate::error::{MonitorError, Result};
use chrono::{DateTime, TimeZone};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Crontab weekday numbering: 0 and 7 are Sunday.
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    inner: cron::Schedule,
}

impl Schedule {
    /// Parse a crontab expression (`min hour dom mon dow`, or an `@daily`-style macro)
    /// with the same meaning the cron daemon gives it.
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let expanded = expand_macro(expression)?;

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields[..] else {
            return Err(MonitorError::Config(format!(
                "invalid cron expression {:?}: expected 5 fields, found {}",
                expression,
                fields.len()
            )));
        };

        // The cron crate wants a seconds column and counts weekdays 1-7 from Sunday,
        // so weekdays are handed over by name.
        let normalised = format!(
            "0 {} {} {} {} {}",
            minute,
            hour,
            dom,
            month,
            day_of_week(dow)?
        );

        let inner = cron::Schedule::from_str(&normalised)?;
        Ok(Self {
            expression: expression.to_string(),
            inner,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `base`.
    pub fn next_after<Tz: TimeZone>(&self, base: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.inner.after(base).next()
    }

    /// `"<expression> <command>\n"`
    pub fn crontab_line(&self, command: &str) -> String {
        format!("{} {}\n", self.expression, command)
    }

    /// Overwrite `path` with the single crontab line for `command`.
    pub fn write_crontab(&self, path: &Path, command: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.crontab_line(command))?;
        info!("Wrote crontab {:?}: {} {}", path, self.expression, command);
        Ok(())
    }
}

fn expand_macro(expression: &str) -> Result<&str> {
    if !expression.starts_with('@') {
        return Ok(expression);
    }
    match expression.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        "@monthly" => Ok("0 0 1 * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@hourly" => Ok("0 * * * *"),
        _ => Err(MonitorError::Config(format!(
            "unsupported cron macro {:?}",
            expression
        ))),
    }
}

/// Rewrite a crontab weekday field as an explicit list of day names.
fn day_of_week(field: &str) -> Result<String> {
    if field == "*" {
        return Ok(field.to_string());
    }
    let bad = || MonitorError::Config(format!("invalid day-of-week field {:?}", field));

    let mut days = [false; 7];
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((b, s)) => (b, s.parse::<usize>().ok().filter(|s| *s > 0).ok_or_else(bad)?),
            None => (item, 1),
        };
        let (start, end) = if base == "*" {
            (0, 7)
        } else if let Some((a, b)) = base.split_once('-') {
            (day_number(a).ok_or_else(bad)?, day_number(b).ok_or_else(bad)?)
        } else {
            let d = day_number(base).ok_or_else(bad)?;
            // `5/2` runs from 5 to the end of the week
            (d, if item.contains('/') { 7 } else { d })
        };
        if start > end {
            return Err(bad());
        }
        for d in (start..=end).step_by(step) {
            days[d % 7] = true;
        }
    }

    Ok(DAY_NAMES
        .iter()
        .zip(days)
        .filter(|(_, on)| *on)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(","))
}

/// `0`-`7` or a three-letter English name.
fn day_number(s: &str) -> Option<usize> {
    if let Ok(n) = s.parse::<usize>() {
        return (n <= 7).then_some(n);
    }
    DAY_NAMES.iter().position(|d| d.eq_ignore_ascii_case(s))
}
