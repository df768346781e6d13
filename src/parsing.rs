/// Text → value conversion shared by the normalizer, the tide reconstructor
/// and the flat-file readers.
///
/// Every function returns `Option`: a `None` is a malformed field, which the
/// caller counts and drops rather than treating as fatal.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Timestamp layouts seen in CEMADEN payloads and exports, tried in order
/// after RFC 3339.
const SOURCE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIDE_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];
const TIDE_TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S"];
const TIDE_COMBINED_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses a numeric field that may use a decimal comma ("2,4") or a
/// decimal point ("2.4").
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Parses a source timestamp as UTC. Explicit offsets are honoured;
/// naive timestamps are taken to already be UTC.
pub fn parse_utc_timestamp(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    SOURCE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Converts a UTC wall-clock time to naive local time at `offset`.
pub fn utc_to_local(utc: NaiveDateTime, offset: FixedOffset) -> NaiveDateTime {
    utc.and_utc().with_timezone(&offset).naive_local()
}

/// Parses a tide table's date + time columns (DD/MM/YYYY + HH:MM).
pub fn parse_tide_split(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = TIDE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date.trim(), fmt).ok())?;
    let time = TIDE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(time.trim(), fmt).ok())?;
    Some(date.and_time(time))
}

/// Parses an already-combined local tide timestamp.
pub fn parse_tide_combined(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    TIDE_COMBINED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}
