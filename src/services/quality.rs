// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data quality scanning and repair of the activity and media tables.
//!
//! A scan builds a fresh report from the current tables. A fix rewrites one
//! table (two for orphan media), always backing it up first, and refuses to
//! write when it would change nothing.

use crate::config::files;
use crate::models::{
    ActivityRecord, FixAction, IssueKey, MediaRecord, QualityIssue, QualityReport,
};
use crate::models::quality::UnknownFixAction;
use crate::services::control::{CancelToken, Cancelled, ProgressSink};
use crate::services::dataset::DatasetService;
use crate::store::{StoreError, Table};
use crate::time_utils::{format_utc_millis, format_utc_rfc3339, parse_instant};
use std::collections::{HashMap, HashSet};

/// Activities processed between two progress reports and cancel checks.
pub const SCAN_BATCH: usize = 25;

#[derive(Debug, thiserror::Error)]
pub enum QualityError {
    #[error("Unknown fix action: {0}")]
    UnknownAction(String),

    #[error("Required table {0} is missing")]
    MissingTable(&'static str),

    #[error("Nothing to fix for {0}")]
    NothingToFix(FixAction),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job cancelled")]
    Cancelled,
}

impl From<Cancelled> for QualityError {
    fn from(_: Cancelled) -> Self {
        QualityError::Cancelled
    }
}

impl From<UnknownFixAction> for QualityError {
    fn from(e: UnknownFixAction) -> Self {
        QualityError::UnknownAction(e.0)
    }
}

/// What a fix changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOutcome {
    pub action: FixAction,
    /// Rows dropped from the table
    pub removed: usize,
    /// Rows rewritten in place
    pub repaired: usize,
}

/// Sample label of an activity row: its id, or its data row number.
fn row_label(record: &ActivityRecord, index: usize) -> String {
    let id = record.id.trim();
    if id.is_empty() {
        format!("row {}", index + 1)
    } else {
        id.to_string()
    }
}

#[derive(Default)]
struct Tally {
    count: usize,
    samples: Vec<String>,
}

impl Tally {
    fn add(&mut self, sample: impl FnOnce() -> String) {
        self.count += 1;
        if self.samples.len() < crate::models::quality::MAX_SAMPLES {
            self.samples.push(sample());
        }
    }

    fn into_issue(self, key: IssueKey) -> QualityIssue {
        QualityIssue::new(key, self.count, self.samples)
    }
}

/// Activity ids and file keys that media rows may link to.
struct ActivityLinks {
    ids: HashSet<String>,
    file_keys: HashSet<String>,
}

impl ActivityLinks {
    fn new(activities: &[ActivityRecord]) -> Self {
        let ids = activities
            .iter()
            .map(|a| a.id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let file_keys = activities
            .iter()
            .map(ActivityRecord::file_key)
            .filter(|key| !key.is_empty())
            .collect();
        Self { ids, file_keys }
    }

    fn links(&self, media: &MediaRecord) -> bool {
        media.candidate_ids().iter().any(|id| self.ids.contains(*id))
            || self.file_keys.contains(&media.basename_key())
    }
}

/// Scan the dataset and build a report. Progress runs from 0 to 90; the
/// caller reports completion once the report is stored.
pub fn scan(
    dataset: &DatasetService,
    progress: &ProgressSink,
    cancel: &CancelToken,
) -> Result<QualityReport, QualityError> {
    progress.report(0);
    let activities = dataset.activities()?;
    let media = dataset.media()?;
    cancel.check()?;
    progress.report(5);

    let rows = activities.rows();
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    let mut missing_timestamps = Tally::default();
    let mut missing_coordinates = Tally::default();
    let mut malformed = Tally::default();

    for (i, record) in rows.iter().enumerate() {
        if i > 0 && i % SCAN_BATCH == 0 {
            cancel.check()?;
            progress.report_fraction(i, rows.len(), 5, 80);
        }

        let id = record.id.trim();
        if !id.is_empty() {
            let seen = occurrences.entry(id).or_insert(0);
            if *seen == 0 {
                first_seen.push(id);
            }
            *seen += 1;
        }

        if record.instant().is_none() {
            missing_timestamps.add(|| row_label(record, i));
        }
        if record.is_malformed() {
            malformed.add(|| row_label(record, i));
        }
        if dataset.track_path(record)?.is_none() {
            missing_coordinates.add(|| row_label(record, i));
        }
    }

    let mut duplicates = Tally::default();
    for id in first_seen {
        if occurrences.get(id).copied().unwrap_or(0) > 1 {
            duplicates.add(|| id.to_string());
        }
    }

    cancel.check()?;
    progress.report(80);

    let links = ActivityLinks::new(rows);
    let mut orphans = Tally::default();
    for item in media.rows() {
        if !links.links(item) {
            orphans.add(|| item.filename.clone());
        }
    }
    progress.report(90);

    let report = QualityReport {
        generated_at: format_utc_millis(chrono::Utc::now()),
        issues: vec![
            duplicates.into_issue(IssueKey::DuplicateActivities),
            missing_timestamps.into_issue(IssueKey::MissingTimestamps),
            missing_coordinates.into_issue(IssueKey::MissingCoordinates),
            malformed.into_issue(IssueKey::MalformedRecords),
            orphans.into_issue(IssueKey::OrphanMedia),
        ],
    };

    tracing::info!(
        activities = rows.len(),
        media = media.len(),
        issues = report.issues.iter().filter(|i| i.count > 0).count(),
        "Data quality scan complete"
    );
    Ok(report)
}

/// Keep the first row of every id. Rows without an id are kept.
pub fn dedupe_activities(rows: &[ActivityRecord]) -> Vec<ActivityRecord> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| {
            let id = r.id.trim();
            id.is_empty() || seen.insert(id.to_string())
        })
        .cloned()
        .collect()
}

/// Fill an unusable timestamp column from the other one. Returns how many
/// rows changed.
///
/// An empty or unreadable activity date is filled from a readable start
/// time. An unreadable (but present) start time is replaced by a readable
/// activity date; an empty start time is left alone since many exports
/// do not carry the column at all.
pub fn repair_timestamps(rows: &mut [ActivityRecord]) -> usize {
    let mut repaired = 0;
    for record in rows.iter_mut() {
        let date = parse_instant(&record.activity_date);
        let start = parse_instant(&record.start_time);
        match (date, start) {
            (None, Some(start)) => {
                record.activity_date = format_utc_rfc3339(start);
                repaired += 1;
            }
            (Some(date), None) if !record.start_time.trim().is_empty() => {
                record.start_time = format_utc_rfc3339(date);
                repaired += 1;
            }
            _ => {}
        }
    }
    repaired
}

pub fn remove_malformed(rows: &[ActivityRecord]) -> Vec<ActivityRecord> {
    rows.iter().filter(|r| !r.is_malformed()).cloned().collect()
}

/// Split media rows into (linked, orphaned).
pub fn partition_orphans(
    activities: &[ActivityRecord],
    media: &[MediaRecord],
) -> (Vec<MediaRecord>, Vec<MediaRecord>) {
    let links = ActivityLinks::new(activities);
    media.iter().cloned().partition(|m| links.links(m))
}

/// Append newly orphaned rows to previously quarantined ones, dropping
/// repeats by (filename, caption).
pub fn merge_orphans(existing: &[MediaRecord], new: Vec<MediaRecord>) -> Vec<MediaRecord> {
    let mut merged = existing.to_vec();
    let owned = |(filename, caption): (&str, &str)| (filename.to_owned(), caption.to_owned());
    let mut seen: HashSet<(String, String)> =
        existing.iter().map(|m| owned(m.identity())).collect();
    for record in new {
        if seen.insert(owned(record.identity())) {
            merged.push(record);
        }
    }
    merged
}

/// Apply a fix action. Progress is reported at each phase and the cancel
/// token is checked before anything is written.
pub fn fix(
    dataset: &DatasetService,
    action: FixAction,
    progress: &ProgressSink,
    cancel: &CancelToken,
) -> Result<FixOutcome, QualityError> {
    progress.report(0);
    let folder = dataset.folder();
    let activities = dataset.activities()?;
    cancel.check()?;
    progress.report(20);

    let outcome = match action {
        FixAction::DedupeActivities | FixAction::RemoveMalformedRecords => {
            let kept = if action == FixAction::DedupeActivities {
                dedupe_activities(activities.rows())
            } else {
                remove_malformed(activities.rows())
            };
            if kept.len() == activities.len() {
                return Err(QualityError::NothingToFix(action));
            }
            let removed = activities.len() - kept.len();
            let fixed = activities.with_rows(kept);
            progress.report(50);

            cancel.check()?;
            folder.backup(files::ACTIVITIES)?;
            progress.report(70);
            cancel.check()?;
            folder.write(files::ACTIVITIES, &fixed)?;

            FixOutcome {
                action,
                removed,
                repaired: 0,
            }
        }
        FixAction::RepairTimestamps => {
            let mut rows = activities.rows().to_vec();
            let repaired = repair_timestamps(&mut rows);
            if repaired == 0 {
                return Err(QualityError::NothingToFix(action));
            }
            let mut fixed = activities.with_rows(rows);
            fixed
                .layout_mut()
                .ensure_field::<ActivityRecord>(ActivityRecord::ACTIVITY_DATE);
            progress.report(50);

            cancel.check()?;
            folder.backup(files::ACTIVITIES)?;
            progress.report(70);
            cancel.check()?;
            folder.write(files::ACTIVITIES, &fixed)?;

            FixOutcome {
                action,
                removed: 0,
                repaired,
            }
        }
        FixAction::RemoveOrphanMedia => {
            if !folder.has_table(files::MEDIA) {
                return Err(QualityError::MissingTable(files::MEDIA));
            }
            let media = dataset.media()?;
            let (linked, orphans) = partition_orphans(activities.rows(), media.rows());
            if orphans.is_empty() {
                return Err(QualityError::NothingToFix(action));
            }
            let removed = orphans.len();

            let quarantine: Table<MediaRecord> = folder.read(files::ORPHAN_MEDIA)?;
            let quarantine = if quarantine.is_empty() {
                // New quarantine table mirrors the media table's columns
                media.with_rows(merge_orphans(&[], orphans))
            } else {
                quarantine.with_rows(merge_orphans(quarantine.rows(), orphans))
            };
            let remaining = media.with_rows(linked);
            progress.report(50);

            cancel.check()?;
            folder.backup(files::MEDIA)?;
            folder.backup(files::ORPHAN_MEDIA)?;
            progress.report(70);
            cancel.check()?;
            folder.write(files::ORPHAN_MEDIA, &quarantine)?;
            folder.write(files::MEDIA, &remaining)?;

            FixOutcome {
                action,
                removed,
                repaired: 0,
            }
        }
    };

    progress.report(100);
    tracing::info!(
        action = %outcome.action,
        removed = outcome.removed,
        repaired = outcome.repaired,
        "Data quality fix applied"
    );
    Ok(outcome)
}
