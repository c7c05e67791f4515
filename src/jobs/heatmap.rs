// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Heatmap point set over every stored route.

use super::{blocking, JobError, JobRun};
use crate::config::files;
use crate::services::geometry::PointSet;
use crate::time_utils::format_utc_millis;
use serde::{Deserialize, Serialize};

/// The `heatmap.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapArtifact {
    pub generated_at: String,
    pub count: usize,
    /// Distinct `[lon, lat]` pairs
    pub points: Vec<[f64; 2]>,
}

pub async fn generate_heatmap(run: JobRun) -> Result<(), JobError> {
    let JobRun {
        entry,
        dataset,
        progress,
        cancel,
        ..
    } = run;

    blocking(move || {
        progress.report(0);
        let routes = dataset.routes()?;
        cancel.check()?;

        let mut points = PointSet::default();
        for (i, route) in routes.iter().enumerate() {
            points.extend_from(&route.collection);
            progress.report_fraction(i + 1, routes.len(), 10, 90);
        }
        cancel.check()?;

        let artifact = HeatmapArtifact {
            generated_at: format_utc_millis(chrono::Utc::now()),
            count: points.len(),
            points: points.into_points(),
        };
        dataset.write_json(files::HEATMAP, &artifact)?;
        progress.report(100);

        tracing::info!(
            user_id = %entry.user_id,
            routes = routes.len(),
            points = artifact.count,
            "Heatmap written"
        );
        Ok(())
    })
    .await
}
