// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Turn activity track files into simplified stored routes.

use super::{blocking, JobError, JobHandler, JobRun};
use crate::config::TrackSettings;
use crate::models::{ActivityRecord, JobType};
use crate::services::dataset::route_props;
use crate::services::geometry::{clean, encode_polyline, lines, simplify};
use crate::services::tracks::{load_track, TrackError};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::{stream, StreamExt};
use geojson::FeatureCollection;
use std::path::PathBuf;

pub struct ProcessActivities {
    settings: TrackSettings,
}

impl ProcessActivities {
    pub fn new(settings: TrackSettings) -> Self {
        Self { settings }
    }
}

impl JobHandler for ProcessActivities {
    fn run(&self, run: JobRun) -> BoxFuture<'static, Result<(), JobError>> {
        process_activities(self.settings, run).boxed()
    }
}

/// Parse, clean and simplify one track. `None` when no line survives.
pub fn build_route(
    activity: &ActivityRecord,
    path: &std::path::Path,
    settings: &TrackSettings,
) -> Result<Option<FeatureCollection>, TrackError> {
    let parsed = load_track(path)?;
    let cleaned = clean(&parsed, settings.outlier_threshold_km);
    let mut route = simplify(&cleaned, settings.simplify_tolerance);

    if !lines(&route).iter().any(|line| line.len() >= 2) {
        return Ok(None);
    }

    let polyline = encode_polyline(&route)?;
    for feature in &mut route.features {
        feature.set_property(route_props::ACTIVITY_ID, activity.id.trim());
        feature.set_property(route_props::NAME, activity.name.as_str());
        feature.set_property(route_props::TYPE, activity.activity_type.as_str());
        feature.set_property(route_props::POLYLINE, polyline.as_str());
    }
    Ok(Some(route))
}

async fn process_activities(settings: TrackSettings, run: JobRun) -> Result<(), JobError> {
    run.progress.report(0);

    let dataset = run.dataset.clone();
    let work: Vec<(ActivityRecord, PathBuf)> = blocking(move || {
        let mut work = Vec::new();
        for activity in dataset.activities()?.into_rows() {
            if let Some(path) = dataset.track_path(&activity)? {
                work.push((activity, path));
            }
        }
        Ok(work)
    })
    .await?;
    run.cancel.check()?;

    let total = work.len();
    tracing::info!(user_id = %run.user_id(), tracks = total, "Processing activity tracks");
    run.progress.report(5);

    // Parsing runs concurrently; routes are written one at a time here
    let mut parsed = stream::iter(work)
        .map(|(activity, path)| {
            tokio::task::spawn_blocking(move || {
                let route = build_route(&activity, &path, &settings);
                (activity, path, route)
            })
        })
        .buffer_unordered(settings.parse_concurrency.max(1));

    let (mut done, mut stored, mut skipped) = (0, 0, 0);
    while let Some(joined) = parsed.next().await {
        done += 1;
        match joined {
            Ok((activity, _, Ok(Some(route)))) => {
                run.cancel.check()?;
                match run.dataset.save_route(&activity.file_key(), &route) {
                    Ok(()) => stored += 1,
                    Err(e) => {
                        tracing::warn!(activity_id = %activity.id, error = %e, "Failed to store route");
                        skipped += 1;
                    }
                }
            }
            Ok((activity, _, Ok(None))) => {
                tracing::debug!(activity_id = %activity.id, "Track has no usable line");
                skipped += 1;
            }
            Ok((activity, path, Err(e))) => {
                tracing::warn!(
                    activity_id = %activity.id,
                    path = %path.display(),
                    error = %e,
                    "Failed to process track"
                );
                skipped += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Track worker failed");
                skipped += 1;
            }
        }
        run.progress.report_fraction(done, total, 5, 95);
    }

    tracing::info!(user_id = %run.user_id(), stored, skipped, "Activity tracks processed");
    run.cancel.check()?;
    run.follow_up(JobType::GenerateHeatmap, "Heatmap after activity processing")?;
    run.progress.report(100);
    Ok(())
}
