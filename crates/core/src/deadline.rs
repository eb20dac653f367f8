//! Deadline normalization for extracted action items.
//!
//! The todo capability instructs the backend to emit absolute timestamps,
//! but the rules are enforced again here deterministically: relative
//! expressions resolve against a caller-supplied reference time, bare dates
//! default to 18:00, and missing deadline information maps to an explicit
//! unresolved sentinel that is never coerced into a real timestamp.

use chrono::{Days, Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::DomainError;

/// Literal marker the extraction prompt uses for "deadline not determinable".
pub const UNRESOLVED_SENTINEL: &str = "待确认";

/// Time of day assumed when a deadline names a date but no time.
pub const DEFAULT_DEADLINE_HOUR: u32 = 18;

const ABSOLUTE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deadline {
    Resolved(NaiveDateTime),
    Unresolved,
}

impl Deadline {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Resolved(at) => Some(*at),
            Self::Unresolved => None,
        }
    }
}

/// Resolve a raw deadline expression against `reference_now`.
///
/// Unrecognized expressions come back as [`Deadline::Unresolved`]; a guess is
/// never invented for them.
pub fn normalize(raw: &str, reference_now: NaiveDateTime) -> Deadline {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == UNRESOLVED_SENTINEL {
        return Deadline::Unresolved;
    }

    if let Some(at) = parse_absolute(trimmed) {
        return Deadline::Resolved(at);
    }
    if let Some(date) = parse_bare_date(trimmed) {
        return Deadline::Resolved(at_default_time(date));
    }
    if let Some(at) = resolve_relative(trimmed, reference_now) {
        return Deadline::Resolved(at);
    }

    Deadline::Unresolved
}

/// Post-validation applied to deadlines returned by the generation backend:
/// only a well-formed absolute timestamp (bare dates included) or the exact
/// unresolved sentinel is acceptable. Relative expressions the backend failed
/// to resolve are rejected rather than quietly re-interpreted.
pub fn validate(raw: &str) -> Result<Deadline, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == UNRESOLVED_SENTINEL {
        return Ok(Deadline::Unresolved);
    }
    if let Some(at) = parse_absolute(trimmed) {
        return Ok(Deadline::Resolved(at));
    }
    if let Some(date) = parse_bare_date(trimmed) {
        return Ok(Deadline::Resolved(at_default_time(date)));
    }
    Err(DomainError::InvalidDeadline(trimmed.to_string()))
}

/// Parse an absolute `YYYY-MM-DD HH:MM[:SS]` timestamp (`T` separator
/// accepted). Shared with meeting start-time handling at persistence.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ABSOLUTE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn parse_absolute(value: &str) -> Option<NaiveDateTime> {
    parse_timestamp(value)
}

fn parse_bare_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn at_default_time(date: NaiveDate) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(DEFAULT_DEADLINE_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time)
}

fn resolve_relative(value: &str, reference_now: NaiveDateTime) -> Option<NaiveDateTime> {
    // Optional trailing clock time, e.g. "明天 10:00".
    let (keyword, explicit_time) = match value.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, NaiveTime::parse_from_str(rest.trim(), "%H:%M").ok()),
        None => (value, None),
    };

    let today = reference_now.date();
    let date = match keyword {
        "今天" | "today" => Some(today),
        "明天" | "tomorrow" => today.checked_add_days(Days::new(1)),
        "后天" => today.checked_add_days(Days::new(2)),
        "大后天" => today.checked_add_days(Days::new(3)),
        "下周" | "next week" => today.checked_add_days(Days::new(7)),
        "下个月" | "下月" | "next month" => today.checked_add_months(Months::new(1)),
        _ => None,
    }?;

    Some(match explicit_time {
        Some(time) => date.and_time(time),
        None => at_default_time(date),
    })
}
