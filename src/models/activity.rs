// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity rows from the exported `activities.csv` table.

use crate::services::tracks::activity_file_key;
use crate::store::{Column, TableRecord};
use crate::time_utils::parse_instant;
use chrono::{DateTime, Utc};

/// One recorded activity.
///
/// Known columns are typed fields; the export's remaining columns (there
/// are dozens) ride along in `extras`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityRecord {
    /// Activity identifier (numeric in practice, kept verbatim)
    pub id: String,
    /// Activity date as written in the export
    pub activity_date: String,
    /// Activity name/title
    pub name: String,
    /// Sport type (Ride, Run, Hike, etc.)
    pub activity_type: String,
    /// Elapsed time in seconds
    pub elapsed_time: String,
    /// Distance, in the export's unit
    pub distance: String,
    /// Elevation gain in meters
    pub elevation_gain: String,
    /// Relative path of the track file (e.g. `activities/123.fit.gz`)
    pub filename: String,
    /// Start time, for exports that carry it separately
    pub start_time: String,
    /// Unknown columns, in file order
    pub extras: Vec<String>,
}

impl ActivityRecord {
    pub const ID: usize = 0;
    pub const ACTIVITY_DATE: usize = 1;
    pub const START_TIME: usize = 8;

    /// Record with just an id, mostly for tests.
    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn parsed_activity_date(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.activity_date)
    }

    pub fn parsed_start_time(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.start_time)
    }

    /// The activity's instant: activity date first, start time as fallback.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.parsed_activity_date()
            .or_else(|| self.parsed_start_time())
    }

    /// True when a timestamp cell holds text that does not parse.
    pub fn has_unparseable_timestamp(&self) -> bool {
        let bad = |raw: &str| !raw.trim().is_empty() && parse_instant(raw).is_none();
        bad(&self.activity_date) || bad(&self.start_time)
    }

    /// Empty id, or a timestamp that is present but unreadable.
    pub fn is_malformed(&self) -> bool {
        self.id.trim().is_empty() || self.has_unparseable_timestamp()
    }

    /// Key used to find the track file and to match media names.
    pub fn file_key(&self) -> String {
        activity_file_key(&self.filename, &self.id)
    }

    pub fn distance_value(&self) -> Option<f64> {
        self.distance.replace(',', "").trim().parse().ok()
    }
}

impl TableRecord for ActivityRecord {
    const COLUMNS: &'static [Column] = &[
        Column {
            name: "id",
            aliases: &["Activity ID", "activity_id"],
        },
        Column {
            name: "activity_date",
            aliases: &["Activity Date", "date"],
        },
        Column {
            name: "name",
            aliases: &["Activity Name"],
        },
        Column {
            name: "type",
            aliases: &["Activity Type", "sport_type"],
        },
        Column {
            name: "elapsed_time",
            aliases: &["Elapsed Time"],
        },
        Column {
            name: "distance",
            aliases: &["Distance"],
        },
        Column {
            name: "elevation_gain",
            aliases: &["Elevation Gain"],
        },
        Column {
            name: "filename",
            aliases: &["Filename"],
        },
        Column {
            name: "start_time",
            aliases: &["Start Time", "start_date"],
        },
    ];

    fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.id,
            1 => &self.activity_date,
            2 => &self.name,
            3 => &self.activity_type,
            4 => &self.elapsed_time,
            5 => &self.distance,
            6 => &self.elevation_gain,
            7 => &self.filename,
            _ => &self.start_time,
        }
    }

    fn field_mut(&mut self, index: usize) -> &mut String {
        match index {
            0 => &mut self.id,
            1 => &mut self.activity_date,
            2 => &mut self.name,
            3 => &mut self.activity_type,
            4 => &mut self.elapsed_time,
            5 => &mut self.distance,
            6 => &mut self.elevation_gain,
            7 => &mut self.filename,
            _ => &mut self.start_time,
        }
    }

    fn extras(&self) -> &[String] {
        &self.extras
    }

    fn extras_mut(&mut self) -> &mut Vec<String> {
        &mut self.extras
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(date: &str, start: &str) -> ActivityRecord {
        ActivityRecord {
            id: "1".into(),
            activity_date: date.into(),
            start_time: start.into(),
            ..Default::default()
        }
    }

    #[test]
    fn instant_prefers_activity_date() {
        let a = activity("2024-01-01T00:00:00Z", "2025-01-01T00:00:00Z");
        assert_eq!(a.instant(), a.parsed_activity_date());
    }

    #[test]
    fn instant_falls_back_to_start_time() {
        let a = activity("", "2025-01-01T00:00:00Z");
        assert!(a.instant().is_some());
        assert!(!a.is_malformed());
    }

    #[test]
    fn absent_timestamps_are_not_malformed() {
        let a = activity("", "");
        assert!(a.instant().is_none());
        assert!(!a.is_malformed());
    }

    #[test]
    fn unparseable_timestamp_is_malformed() {
        let a = activity("yesterday-ish", "2025-01-01T00:00:00Z");
        assert!(a.is_malformed());
        assert!(a.instant().is_some());
    }

    #[test]
    fn empty_id_is_malformed() {
        let mut a = activity("2024-01-01T00:00:00Z", "");
        a.id = "  ".into();
        assert!(a.is_malformed());
    }

    #[test]
    fn file_key_strips_track_extensions() {
        let a = ActivityRecord {
            id: "99".into(),
            filename: "activities/1234567.fit.gz".into(),
            ..Default::default()
        };
        assert_eq!(a.file_key(), "1234567");
        assert_eq!(ActivityRecord::with_id("99").file_key(), "99");
    }

    #[test]
    fn distance_accepts_thousands_separator() {
        let a = ActivityRecord {
            distance: "1,234.5".into(),
            ..Default::default()
        };
        assert_eq!(a.distance_value(), Some(1234.5));
    }
}
