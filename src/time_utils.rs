// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing and formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Naive layouts seen in exported tables. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%b %d, %Y, %I:%M:%S %p",
];

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a UTC timestamp with millisecond precision (used for report stamps).
pub fn format_utc_millis(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Compact ISO-8601 basic timestamp, safe for use in file names.
///
/// `2026-10-16T10:15:00.123Z` becomes `20261016T101500.123Z`.
pub fn backup_stamp(date: DateTime<Utc>) -> String {
    date.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Parse a timestamp cell into an instant.
///
/// Date-only cells (`2024-03-01`) resolve to midnight UTC. Returns `None`
/// for blank cells and for anything no known layout accepts.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
