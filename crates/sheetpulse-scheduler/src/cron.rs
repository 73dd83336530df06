//! Five-field cron expressions evaluated in a tenant's timezone.
//!
//! Expressions use the classic `minute hour day-of-month month day-of-week`
//! layout. Day-of-week accepts `0-7` (both `0` and `7` are Sunday) or
//! `SUN-SAT`. Day-of-month and day-of-week must both match.
//!
//! Next-run computation walks the schedule in local wall-clock time and
//! maps each candidate back to UTC with `chrono-tz`:
//!
//! - a local time skipped by a spring-forward transition fires at the first
//!   valid minute after the gap;
//! - a local time repeated by a fall-back transition fires once, at its
//!   earlier instant.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::SchedulerError;

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Longest DST gap we step across, in minutes.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// How far past local `now` a candidate may lie and still resolve to an
/// instant at or before `now`. Covers the longest repeated (fall-back) span.
const MAX_REPEAT_HOURS: i64 = 48;

/// A validated cron expression.
#[derive(Debug, Clone)]
pub struct CronSpec {
    expression: String,
    schedule: ::cron::Schedule,
}

impl CronSpec {
    /// Parse a five-field expression.
    pub fn parse(expression: &str) -> Result<Self, SchedulerError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::invalid_cron(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let day_of_week = normalize_day_of_week(fields[4])
            .map_err(|reason| SchedulerError::invalid_cron(expression, reason))?;
        let translated = format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3].to_ascii_uppercase(),
            day_of_week
        );

        let schedule = ::cron::Schedule::from_str(&translated)
            .map_err(|e| SchedulerError::invalid_cron(expression, e.to_string()))?;

        if schedule.after(&Utc::now()).next().is_none() {
            return Err(SchedulerError::invalid_cron(expression, "never fires"));
        }

        Ok(Self {
            expression: fields.join(" "),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First instant strictly after `now` matching the expression in `tz`.
    pub fn next_after(&self, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // The cron crate iterates in a fixed offset zone; feed it local wall
        // clock time labelled as UTC and resolve each hit against `tz`.
        let local_now = now.with_timezone(&tz).naive_local();
        let horizon = local_now + Duration::hours(MAX_REPEAT_HOURS);
        let mut cursor = Utc.from_utc_datetime(&local_now);

        // Inside a repeated hour every candidate resolves to its earlier,
        // already elapsed instant; keep walking until past the repetition.
        loop {
            let candidate = self.schedule.after(&cursor).next()?;
            if let Some(instant) = resolve_local(tz, candidate.naive_utc()) {
                if instant > now {
                    return Some(instant);
                }
            }
            if candidate.naive_utc() > horizon {
                return None;
            }
            cursor = candidate;
        }
    }
}

/// Map a local wall-clock time to UTC, stepping across DST gaps.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    let mut wall = local;
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&wall) {
            LocalResult::Single(t) => return Some(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(a, b) => return Some(a.min(b).with_timezone(&Utc)),
            LocalResult::None => wall += Duration::minutes(1),
        }
    }
    None
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, SchedulerError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| SchedulerError::InvalidTimezone(name.to_string()))
}

/// Next run of `expression` in `timezone` strictly after `now`.
pub fn compute_next_run(
    expression: &str,
    timezone: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedulerError> {
    let spec = CronSpec::parse(expression)?;
    let tz = parse_timezone(timezone)?;
    spec.next_after(tz, now)
        .ok_or_else(|| SchedulerError::invalid_cron(expression, "no upcoming run"))
}

fn weekday_number(token: &str) -> Result<u8, String> {
    if let Ok(n) = token.parse::<u8>() {
        return match n {
            0..=6 => Ok(n),
            7 => Ok(0),
            _ => Err(format!("day-of-week {} out of range 0-7", n)),
        };
    }
    let upper = token.to_ascii_uppercase();
    WEEKDAYS
        .iter()
        .position(|d| *d == upper)
        .map(|i| i as u8)
        .ok_or_else(|| format!("unknown day-of-week '{}'", token))
}

/// Rewrite a classic day-of-week field as a list of weekday names.
fn normalize_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok("*".to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{}'", step))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = match range {
            "*" | "?" => (0, 6),
            _ => match range.split_once('-') {
                Some((a, b)) => {
                    let (a, b) = (weekday_number(a)?, day_bound(b)?);
                    if a > b {
                        return Err(format!("descending day-of-week range '{}'", range));
                    }
                    (a, b)
                }
                None if step > 1 => (weekday_number(range)?, 6),
                None => {
                    let day = weekday_number(range)?;
                    (day, day)
                }
            },
        };

        days.extend((start..=end).step_by(step as usize).map(|d| d % 7));
    }

    if days.is_empty() {
        return Err(format!("empty day-of-week field '{}'", field));
    }

    Ok(days
        .into_iter()
        .map(|d| WEEKDAYS[d as usize])
        .collect::<Vec<_>>()
        .join(","))
}

/// Range upper bound; `7` stays 7 so that `5-7` means Friday to Sunday.
fn day_bound(token: &str) -> Result<u8, String> {
    match token.parse::<u8>() {
        Ok(7) => Ok(7),
        _ => weekday_number(token),
    }
}
