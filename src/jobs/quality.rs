// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data quality scan and fix jobs.

use super::{blocking, JobError, JobRun};
use crate::config::files;
use crate::models::job::PAYLOAD_ACTION;
use crate::models::{FixAction, JobEntry, JobType};
use crate::services::quality::{self, QualityError};

/// Scan the dataset and store `data-quality-report.json`.
pub async fn data_quality_scan(run: JobRun) -> Result<(), JobError> {
    let JobRun {
        dataset,
        progress,
        cancel,
        ..
    } = run;

    blocking(move || {
        let report = quality::scan(&dataset, &progress, &cancel)?;
        cancel.check()?;
        dataset.write_json(files::QUALITY_REPORT, &report)?;
        progress.report(100);
        Ok(())
    })
    .await
}

/// Apply the fix named by the entry's `action` payload, then rescan.
pub async fn data_quality_fix(run: JobRun) -> Result<(), JobError> {
    let action: FixAction = run
        .entry
        .payload_value(PAYLOAD_ACTION)
        .ok_or_else(|| QualityError::UnknownAction("(none)".to_string()))?
        .parse()
        .map_err(QualityError::from)?;

    let JobRun {
        entry,
        dataset,
        progress,
        cancel,
        queue,
    } = run;

    blocking(move || Ok(quality::fix(&dataset, action, &progress, &cancel)?)).await?;

    queue.enqueue(JobEntry::new(
        &entry.user_id,
        JobType::DataQualityScan,
        format!("Rescan after {action}"),
    ))?;
    Ok(())
}
