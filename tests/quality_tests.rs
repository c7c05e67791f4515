// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data quality scan and fix behavior over real dataset folders.

use activity_vault::config::files;
use activity_vault::models::job::PAYLOAD_ACTION;
use activity_vault::models::{FixAction, IssueKey, JobEntry, JobType, QualityReport};
use activity_vault::services::quality::{fix, scan};
use activity_vault::services::{CancelToken, DatasetService, FixOutcome, ProgressSink, QualityError};
use std::collections::BTreeMap;

mod common;
use common::USER;

const ACTIVITIES: &str = "\
Activity ID,Activity Date,Activity Name,Activity Type,Filename
12345,\"Mar 1, 2024, 7:00:00 AM\",Commute,Ride,
12345,\"Mar 1, 2024, 7:00:00 AM\",Commute,Ride,
23456,not a date,Lunch run,Run,
34567,,Evening walk,Walk,
";

const MEDIA: &str = "\
Media Filename,Media Caption
media/12345_trip.jpg,Bridge
media/98765.jpg,Unknown
media/23456.jpg,
";

fn dataset(dir: &tempfile::TempDir) -> DatasetService {
    DatasetService::new(common::user_folder(dir))
}

fn run_fix(service: &DatasetService, action: FixAction) -> Result<FixOutcome, QualityError> {
    fix(service, action, &ProgressSink::noop(), &CancelToken::new())
}

#[test]
fn test_scan_counts_each_issue() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(&dir, files::ACTIVITIES, ACTIVITIES);
    common::write_file(&dir, files::MEDIA, MEDIA);

    let report = scan(&dataset(&dir), &ProgressSink::noop(), &CancelToken::new()).unwrap();
    let keys: Vec<_> = report.issues.iter().map(|i| i.key).collect();
    assert_eq!(keys, IssueKey::ALL.to_vec());

    let count = |key| report.issue(key).unwrap().count;
    assert_eq!(count(IssueKey::DuplicateActivities), 1);
    assert_eq!(count(IssueKey::MalformedRecords), 1);
    assert_eq!(count(IssueKey::MissingTimestamps), 2);
    assert_eq!(count(IssueKey::OrphanMedia), 1);

    let orphans = report.issue(IssueKey::OrphanMedia).unwrap();
    assert_eq!(orphans.samples, vec!["media/98765.jpg"]);
    assert_eq!(orphans.fix_action, Some(FixAction::RemoveOrphanMedia));
}

#[test]
fn test_orphan_detection_by_id_and_basename() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(
        &dir,
        files::ACTIVITIES,
        "Activity ID,Filename\n98765,activities/98765.gpx\n555,activities/Morning_Ride.gpx\n",
    );
    common::write_file(
        &dir,
        files::MEDIA,
        "Media Filename\n12345_trip.jpg\n98765.jpg\nmedia/morning_ride.png\n",
    );

    let report = scan(&dataset(&dir), &ProgressSink::noop(), &CancelToken::new()).unwrap();
    let orphans = report.issue(IssueKey::OrphanMedia).unwrap();
    assert_eq!(orphans.count, 1);
    assert_eq!(orphans.samples, vec!["12345_trip.jpg"]);
}

#[test]
fn test_unreadable_track_formats_count_as_missing_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(
        &dir,
        files::ACTIVITIES,
        "Activity ID,Filename\n1,activities/1.tcx\n2,activities/2.gpx\n3,activities/3.tcx.gz\n",
    );
    common::write_file(&dir, "activities/1.tcx", "<TrainingCenterDatabase/>");
    common::write_file(&dir, "activities/2.gpx", "<gpx/>");
    common::write_file(&dir, "activities/3.tcx.gz", "");

    let report = scan(&dataset(&dir), &ProgressSink::noop(), &CancelToken::new()).unwrap();
    let missing = report.issue(IssueKey::MissingCoordinates).unwrap();
    assert_eq!(missing.count, 2);
    assert_eq!(missing.samples, vec!["1", "3"]);
}

#[test]
fn test_empty_folder_scans_clean() {
    let dir = tempfile::tempdir().unwrap();
    let report = scan(&dataset(&dir), &ProgressSink::noop(), &CancelToken::new()).unwrap();
    assert!(report.issues.iter().all(|i| i.count == 0 && i.fix_action.is_none()));
}

#[test]
fn test_dedupe_then_nothing_to_fix() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(&dir, files::ACTIVITIES, ACTIVITIES);
    let service = dataset(&dir);

    let outcome = run_fix(&service, FixAction::DedupeActivities).unwrap();
    assert_eq!(outcome.removed, 1);
    assert_eq!(service.activities().unwrap().len(), 3);

    let again = run_fix(&service, FixAction::DedupeActivities);
    assert!(matches!(again, Err(QualityError::NothingToFix(FixAction::DedupeActivities))));
}

#[test]
fn test_fix_backs_up_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(&dir, files::ACTIVITIES, ACTIVITIES);
    let service = dataset(&dir);

    run_fix(&service, FixAction::RemoveMalformedRecords).unwrap();

    let backups: Vec<_> = std::fs::read_dir(service.folder().backup_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].to_string_lossy().ends_with(files::ACTIVITIES));
    assert_eq!(std::fs::read_to_string(&backups[0]).unwrap(), ACTIVITIES);

    let ids: Vec<_> = service
        .activities()
        .unwrap()
        .rows()
        .iter()
        .map(|a| a.id.clone())
        .collect();
    assert_eq!(ids, vec!["12345", "12345", "34567"]);
}

#[test]
fn test_date_only_rows_are_not_malformed() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(
        &dir,
        files::ACTIVITIES,
        "id,activity_date\n1,2024-03-01\n2,2024-03-02T08:00:00.000\n3,soon\n",
    );
    let service = dataset(&dir);

    let report = scan(&service, &ProgressSink::noop(), &CancelToken::new()).unwrap();
    assert_eq!(report.issue(IssueKey::MalformedRecords).unwrap().count, 1);

    let outcome = run_fix(&service, FixAction::RemoveMalformedRecords).unwrap();
    assert_eq!(outcome.removed, 1);
    let ids: Vec<_> = service
        .activities()
        .unwrap()
        .rows()
        .iter()
        .map(|a| a.id.clone())
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn test_orphan_media_moves_to_quarantine() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(&dir, files::ACTIVITIES, ACTIVITIES);
    common::write_file(&dir, files::MEDIA, MEDIA);
    let service = dataset(&dir);

    let outcome = run_fix(&service, FixAction::RemoveOrphanMedia).unwrap();
    assert_eq!(outcome.removed, 1);

    let kept: Vec<_> = service
        .media()
        .unwrap()
        .rows()
        .iter()
        .map(|m| m.filename.clone())
        .collect();
    assert_eq!(kept, vec!["media/12345_trip.jpg", "media/23456.jpg"]);

    let quarantine = std::fs::read_to_string(service.folder().path(files::ORPHAN_MEDIA)).unwrap();
    assert!(quarantine.starts_with("Media Filename,Media Caption"));
    assert!(quarantine.contains("media/98765.jpg,Unknown"));

    // Media table backed up; the quarantine table did not exist yet
    let backups = std::fs::read_dir(service.folder().backup_dir()).unwrap().count();
    assert_eq!(backups, 1);
}

#[test]
fn test_orphan_fix_requires_media_table() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(&dir, files::ACTIVITIES, ACTIVITIES);
    let result = run_fix(&dataset(&dir), FixAction::RemoveOrphanMedia);
    assert!(matches!(result, Err(QualityError::MissingTable(_))));
}

#[test]
fn test_cancelled_fix_leaves_files_alone() {
    let dir = tempfile::tempdir().unwrap();
    common::write_file(&dir, files::ACTIVITIES, ACTIVITIES);
    let service = dataset(&dir);

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = fix(&service, FixAction::DedupeActivities, &ProgressSink::noop(), &cancel);
    assert!(matches!(result, Err(QualityError::Cancelled)));
    assert_eq!(
        std::fs::read_to_string(service.folder().path(files::ACTIVITIES)).unwrap(),
        ACTIVITIES
    );
    assert!(!service.folder().backup_dir().exists());
}

fn fix_entry(action: &str) -> JobEntry {
    JobEntry::new(USER, JobType::DataQualityFix, "test").with_payload(BTreeMap::from([(
        PAYLOAD_ACTION.to_string(),
        action.to_string(),
    )]))
}

#[tokio::test]
async fn test_fix_job_triggers_rescan() {
    let config = common::test_config(std::path::Path::new("unused"));
    let (dir, queue) = common::start_queue(common::standard_registry(&config));
    common::write_file(&dir, files::ACTIVITIES, ACTIVITIES);

    queue
        .enqueue(JobEntry::new(USER, JobType::DataQualityScan, "initial"))
        .unwrap();
    common::wait_until_stopped(&queue, JobType::DataQualityScan, USER).await;

    let folder = common::user_folder(&dir);
    let before: QualityReport = folder.read_json(files::QUALITY_REPORT).unwrap().unwrap();
    assert_eq!(before.issue(IssueKey::MalformedRecords).unwrap().count, 1);

    queue.enqueue(fix_entry("remove_malformed_records")).unwrap();
    let fixed = common::wait_until_stopped(&queue, JobType::DataQualityFix, USER).await;
    assert_eq!(fixed.error, None);
    let rescan = common::wait_until_stopped(&queue, JobType::DataQualityScan, USER).await;
    assert_eq!(rescan.error, None);

    let after: QualityReport = folder.read_json(files::QUALITY_REPORT).unwrap().unwrap();
    assert_eq!(after.issue(IssueKey::MalformedRecords).unwrap().count, 0);
    assert!(after.generated_at >= before.generated_at);
}

#[tokio::test]
async fn test_fix_job_failures_are_recorded() {
    let config = common::test_config(std::path::Path::new("unused"));
    let (dir, queue) = common::start_queue(common::standard_registry(&config));
    common::write_file(&dir, files::ACTIVITIES, "Activity ID\n1\n2\n");

    queue.enqueue(fix_entry("dedupe_activities")).unwrap();
    let state = common::wait_until_stopped(&queue, JobType::DataQualityFix, USER).await;
    assert!(state.error.unwrap().contains("Nothing to fix"));

    queue.enqueue(fix_entry("polish_everything")).unwrap();
    let state = common::wait_until_stopped(&queue, JobType::DataQualityFix, USER).await;
    assert!(state.error.unwrap().contains("polish_everything"));

    // No rescan after a failed fix
    assert!(!common::user_folder(&dir).path(files::QUALITY_REPORT).exists());
}
