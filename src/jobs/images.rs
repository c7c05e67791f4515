// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map images for single activities and per-type route overlays.

use super::{blocking, JobError, JobHandler, JobRun};
use crate::config::{files, TrackSettings};
use crate::services::geometry::{collection, simplify, smooth};
use crate::services::ImageRenderer;
use futures_util::future::{BoxFuture, FutureExt};
use geojson::Feature;
use std::collections::BTreeMap;
use std::sync::Arc;

/// File-name-safe form of an activity type: `"Trail Run"` becomes `"trail-run"`.
pub fn type_slug(activity_type: &str) -> String {
    let slug: String = activity_type
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "other".to_string()
    } else {
        slug
    }
}

pub struct GenerateActivityImages {
    settings: TrackSettings,
    renderer: Arc<dyn ImageRenderer>,
}

impl GenerateActivityImages {
    pub fn new(settings: TrackSettings, renderer: Arc<dyn ImageRenderer>) -> Self {
        Self { settings, renderer }
    }
}

impl JobHandler for GenerateActivityImages {
    fn run(&self, run: JobRun) -> BoxFuture<'static, Result<(), JobError>> {
        let settings = self.settings;
        let renderer = self.renderer.clone();
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

            let mut written = 0;
            for (i, route) in routes.iter().enumerate() {
                cancel.check()?;
                let smoothed = smooth(&route.collection, settings.smooth_window);
                let simplified = simplify(&smoothed, settings.simplify_tolerance);
                let image = format!(
                    "{}/{}.{}",
                    files::ACTIVITY_IMAGES_DIR,
                    route.key,
                    renderer.extension()
                );

                match renderer.render(&simplified) {
                    Ok(document) => match dataset.write_text(&image, &document) {
                        Ok(()) => written += 1,
                        Err(e) => {
                            tracing::warn!(image = %image, error = %e, "Failed to write activity image");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(route = %route.key, error = %e, "Skipping activity image");
                    }
                }
                progress.report_fraction(i + 1, routes.len(), 5, 100);
            }

            progress.report(100);
            tracing::info!(user_id = %entry.user_id, images = written, "Activity images written");
            Ok(())
        })
        .boxed()
    }
}

pub struct GenerateRouteImages {
    renderer: Arc<dyn ImageRenderer>,
}

impl GenerateRouteImages {
    pub fn new(renderer: Arc<dyn ImageRenderer>) -> Self {
        Self { renderer }
    }
}

impl JobHandler for GenerateRouteImages {
    fn run(&self, run: JobRun) -> BoxFuture<'static, Result<(), JobError>> {
        let renderer = self.renderer.clone();
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

            let mut by_type: BTreeMap<String, Vec<Feature>> = BTreeMap::new();
            for route in &routes {
                by_type
                    .entry(type_slug(route.activity_type()))
                    .or_default()
                    .extend(route.collection.features.iter().cloned());
            }
            progress.report(20);

            let total = by_type.len();
            let mut written = 0;
            for (i, (slug, features)) in by_type.into_iter().enumerate() {
                cancel.check()?;
                let image = format!("{}/{slug}.{}", files::ROUTE_IMAGES_DIR, renderer.extension());
                match renderer.render(&collection(features)) {
                    Ok(document) => match dataset.write_text(&image, &document) {
                        Ok(()) => written += 1,
                        Err(e) => {
                            tracing::warn!(image = %image, error = %e, "Failed to write route image");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(activity_type = %slug, error = %e, "Skipping route image");
                    }
                }
                progress.report_fraction(i + 1, total, 20, 100);
            }

            progress.report(100);
            tracing::info!(
                user_id = %entry.user_id,
                types = total,
                images = written,
                "Route images written"
            );
            Ok(())
        })
        .boxed()
    }
}
