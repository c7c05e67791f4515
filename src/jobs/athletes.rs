// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resolve followers and followed athletes into `athletes.json`.

use super::{blocking, JobError, JobHandler, JobRun};
use crate::config::files;
use crate::models::athlete::{AthleteEntry, AthletesArtifact};
use crate::models::AthleteLinkRecord;
use crate::services::AthleteDirectory;
use crate::store::Table;
use crate::time_utils::format_utc_millis;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const FOLLOWER: &str = "follower";
pub const FOLLOWING: &str = "following";

pub struct ProcessAthletes {
    directory: Arc<dyn AthleteDirectory>,
    /// Pause between two lookups
    delay: Duration,
}

impl ProcessAthletes {
    pub fn new(directory: Arc<dyn AthleteDirectory>, delay: Duration) -> Self {
        Self { directory, delay }
    }
}

impl JobHandler for ProcessAthletes {
    fn run(&self, run: JobRun) -> BoxFuture<'static, Result<(), JobError>> {
        process_athletes(self.directory.clone(), self.delay, run).boxed()
    }
}

/// Distinct athlete ids in first-seen order, with the tables they came from.
pub fn collect_athletes(
    followers: &Table<AthleteLinkRecord>,
    following: &Table<AthleteLinkRecord>,
) -> Vec<AthleteEntry> {
    let mut entries: Vec<AthleteEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let sources = [(followers, FOLLOWER), (following, FOLLOWING)];
    for (table, relation) in sources {
        for row in table.rows() {
            let id = row.athlete_id.trim();
            if id.is_empty() {
                continue;
            }
            let slot = *index.entry(id.to_string()).or_insert_with(|| {
                entries.push(AthleteEntry {
                    id: id.to_string(),
                    relations: Vec::new(),
                    profile: None,
                });
                entries.len() - 1
            });
            let relations = &mut entries[slot].relations;
            if !relations.iter().any(|r| r == relation) {
                relations.push(relation.to_string());
            }
        }
    }
    entries
}

async fn process_athletes(
    directory: Arc<dyn AthleteDirectory>,
    delay: Duration,
    run: JobRun,
) -> Result<(), JobError> {
    run.progress.report(0);
    let dataset = run.dataset.clone();
    let mut athletes = blocking(move || {
        let followers = dataset.athlete_links(files::FOLLOWERS)?;
        let following = dataset.athlete_links(files::FOLLOWING)?;
        Ok(collect_athletes(&followers, &following))
    })
    .await?;
    run.cancel.check()?;
    run.progress.report(5);

    let total = athletes.len();
    let mut found = 0;
    for (i, athlete) in athletes.iter_mut().enumerate() {
        if i > 0 && !delay.is_zero() {
            // Blocks the worker; other queued jobs wait behind the lookups
            tokio::time::sleep(delay).await;
        }
        run.cancel.check()?;

        match directory.lookup(&athlete.id).await {
            Ok(profile) => {
                found += usize::from(profile.is_some());
                athlete.profile = profile;
            }
            Err(e) => {
                tracing::warn!(athlete_id = %athlete.id, error = %e, "Athlete lookup failed");
            }
        }
        run.progress.report_fraction(i + 1, total, 5, 95);
    }

    run.cancel.check()?;
    let artifact = AthletesArtifact {
        generated_at: format_utc_millis(chrono::Utc::now()),
        athletes,
    };
    run.dataset.write_json(files::ATHLETES, &artifact)?;
    run.progress.report(100);

    tracing::info!(user_id = %run.user_id(), athletes = total, found, "Athletes processed");
    Ok(())
}
