use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::types::TrackerError;

pub(crate) fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, TrackerError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

pub(crate) fn parse_optional_datetime(
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, TrackerError> {
    match value {
        Some(raw) => Ok(Some(parse_datetime(raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn format_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_optional_date(
    value: Option<&str>,
) -> Result<Option<NaiveDate>, TrackerError> {
    match value {
        Some(raw) => Ok(Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)),
        None => Ok(None),
    }
}

/// Best-effort deadline parsing. Deadlines arrive as free text from the
/// dashboard and from pasted meeting notes; anything unrecognized is treated
/// as "no deadline" rather than an error.
pub(crate) fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        return Some(date);
    }
    None
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn join_recipients(values: &[String]) -> String {
    values.join("\n")
}

pub(crate) fn split_recipients(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
        .collect()
}
