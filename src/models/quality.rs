// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data quality report model.
//!
//! Serialized as `data-quality-report.json`:
//! `{generatedAt, issues: [{key, label, severity, description, count, samples, fixAction}]}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Maximum number of sample identifiers kept per issue.
pub const MAX_SAMPLES: usize = 8;

/// Category of defect found by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum IssueKey {
    DuplicateActivities,
    MissingTimestamps,
    MissingCoordinates,
    MalformedRecords,
    OrphanMedia,
}

impl IssueKey {
    /// Report order.
    pub const ALL: [IssueKey; 5] = [
        IssueKey::DuplicateActivities,
        IssueKey::MissingTimestamps,
        IssueKey::MissingCoordinates,
        IssueKey::MalformedRecords,
        IssueKey::OrphanMedia,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IssueKey::DuplicateActivities => "Duplicate activities",
            IssueKey::MissingTimestamps => "Missing timestamps",
            IssueKey::MissingCoordinates => "Missing coordinates",
            IssueKey::MalformedRecords => "Malformed records",
            IssueKey::OrphanMedia => "Orphan media",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            IssueKey::DuplicateActivities => {
                "Several rows share the same activity id; totals and maps count them more than once."
            }
            IssueKey::MissingTimestamps => {
                "Neither the activity date nor the start time could be read as a date."
            }
            IssueKey::MissingCoordinates => {
                "No GPX or FIT track file was found for the activity, so it has no route."
            }
            IssueKey::MalformedRecords => {
                "The row has an empty id or a timestamp that is present but unreadable."
            }
            IssueKey::OrphanMedia => {
                "The media file name does not point to any known activity."
            }
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            IssueKey::DuplicateActivities | IssueKey::MalformedRecords => Severity::Critical,
            IssueKey::MissingTimestamps | IssueKey::OrphanMedia => Severity::Warning,
            IssueKey::MissingCoordinates => Severity::Info,
        }
    }

    /// Remediation for this category. Missing track files cannot be
    /// recreated, so that issue has none.
    pub fn fix_action(self) -> Option<FixAction> {
        match self {
            IssueKey::DuplicateActivities => Some(FixAction::DedupeActivities),
            IssueKey::MissingTimestamps => Some(FixAction::RepairTimestamps),
            IssueKey::MissingCoordinates => None,
            IssueKey::MalformedRecords => Some(FixAction::RemoveMalformedRecords),
            IssueKey::OrphanMedia => Some(FixAction::RemoveOrphanMedia),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// Remediation that rewrites a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum FixAction {
    DedupeActivities,
    RepairTimestamps,
    RemoveMalformedRecords,
    RemoveOrphanMedia,
}

impl FixAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FixAction::DedupeActivities => "dedupe_activities",
            FixAction::RepairTimestamps => "repair_timestamps",
            FixAction::RemoveMalformedRecords => "remove_malformed_records",
            FixAction::RemoveOrphanMedia => "remove_orphan_media",
        }
    }
}

impl fmt::Display for FixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized fix action name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown fix action: {0}")]
pub struct UnknownFixAction(pub String);

impl FromStr for FixAction {
    type Err = UnknownFixAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dedupe_activities" => Ok(FixAction::DedupeActivities),
            "repair_timestamps" => Ok(FixAction::RepairTimestamps),
            "remove_malformed_records" => Ok(FixAction::RemoveMalformedRecords),
            "remove_orphan_media" => Ok(FixAction::RemoveOrphanMedia),
            other => Err(UnknownFixAction(other.to_string())),
        }
    }
}

/// One category of defect with its count and a few examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    pub key: IssueKey,
    pub label: String,
    pub severity: Severity,
    pub description: String,
    pub count: usize,
    pub samples: Vec<String>,
    pub fix_action: Option<FixAction>,
}

impl QualityIssue {
    /// Build an issue; the fix action is only offered when something was found.
    pub fn new(key: IssueKey, count: usize, mut samples: Vec<String>) -> Self {
        samples.truncate(MAX_SAMPLES);
        Self {
            key,
            label: key.label().to_string(),
            severity: key.severity(),
            description: key.description().to_string(),
            count,
            samples,
            fix_action: if count > 0 { key.fix_action() } else { None },
        }
    }
}

/// Output of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub generated_at: String,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn issue(&self, key: IssueKey) -> Option<&QualityIssue> {
        self.issues.iter().find(|i| i.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_count_has_no_fix_action() {
        let issue = QualityIssue::new(IssueKey::DuplicateActivities, 0, vec![]);
        assert_eq!(issue.fix_action, None);

        let issue = QualityIssue::new(IssueKey::DuplicateActivities, 2, vec!["1".into()]);
        assert_eq!(issue.fix_action, Some(FixAction::DedupeActivities));
    }

    #[test]
    fn missing_coordinates_never_has_fix_action() {
        let issue = QualityIssue::new(IssueKey::MissingCoordinates, 10, vec![]);
        assert_eq!(issue.fix_action, None);
        assert_eq!(issue.severity, Severity::Info);
    }

    #[test]
    fn samples_are_capped() {
        let samples = (0..20).map(|i| i.to_string()).collect();
        let issue = QualityIssue::new(IssueKey::MalformedRecords, 20, samples);
        assert_eq!(issue.samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn report_json_shape() {
        let report = QualityReport {
            generated_at: "2026-10-16T10:00:00.000Z".into(),
            issues: vec![QualityIssue::new(IssueKey::OrphanMedia, 1, vec!["a.jpg".into()])],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["generatedAt"], "2026-10-16T10:00:00.000Z");
        let issue = &json["issues"][0];
        assert_eq!(issue["key"], "orphan_media");
        assert_eq!(issue["severity"], "warning");
        assert_eq!(issue["fixAction"], "remove_orphan_media");
        assert_eq!(issue["samples"][0], "a.jpg");

        let none = QualityIssue::new(IssueKey::OrphanMedia, 0, vec![]);
        let json = serde_json::to_value(&none).unwrap();
        assert!(json["fixAction"].is_null());
    }

    #[test]
    fn fix_action_parses() {
        assert_eq!(
            "remove_orphan_media".parse::<FixAction>(),
            Ok(FixAction::RemoveOrphanMedia)
        );
        assert!("delete_everything".parse::<FixAction>().is_err());
    }
}
