// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Job bodies and the registry the queue dispatches through.
//!
//! A body receives a [`JobRun`] with everything it may touch: the user's
//! dataset, a progress sink, a cancel token and a handle on the queue for
//! follow-up jobs. Bodies check the token between phases and before every
//! write; a stop request surfaces as [`JobError::Cancelled`].

pub mod activities;
pub mod athletes;
pub mod heatmap;
pub mod images;
pub mod quality;

use crate::config::Config;
use crate::models::{JobEntry, JobType};
use crate::services::{
    AthleteDirectory, Cancelled, CancelToken, DatasetService, ImageRenderer, JobQueue,
    ProgressSink, QualityError, QueueError,
};
use crate::store::StoreError;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Errors a job body can end with.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A stop was requested; not a failure.
    #[error("Job cancelled")]
    Cancelled,

    #[error(transparent)]
    Quality(QualityError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("{0}")]
    Failed(String),
}

impl From<Cancelled> for JobError {
    fn from(_: Cancelled) -> Self {
        JobError::Cancelled
    }
}

impl From<QualityError> for JobError {
    fn from(err: QualityError) -> Self {
        match err {
            QualityError::Cancelled => JobError::Cancelled,
            other => JobError::Quality(other),
        }
    }
}

/// Everything a running job gets to work with.
pub struct JobRun {
    pub entry: JobEntry,
    pub dataset: DatasetService,
    pub progress: ProgressSink,
    pub cancel: CancelToken,
    pub queue: JobQueue,
}

impl JobRun {
    pub fn user_id(&self) -> &str {
        &self.entry.user_id
    }

    /// Queue the next job in a chain for the same user.
    pub fn follow_up(&self, job_type: JobType, body: impl Into<String>) -> Result<bool, JobError> {
        Ok(self
            .queue
            .enqueue(JobEntry::new(&self.entry.user_id, job_type, body))?)
    }
}

/// A job body.
pub trait JobHandler: Send + Sync {
    fn run(&self, run: JobRun) -> BoxFuture<'static, Result<(), JobError>>;
}

struct FnHandler<F>(F);

impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobRun) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn run(&self, run: JobRun) -> BoxFuture<'static, Result<(), JobError>> {
        (self.0)(run).boxed()
    }
}

/// Wrap an async function as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(JobRun) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Handler per job type.
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler of a job type.
    pub fn register(&mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> &mut Self {
        self.handlers.insert(job_type, handler);
        self
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&job_type).cloned()
    }

    /// The production wiring of every job type.
    pub fn standard(
        config: &Config,
        renderer: Arc<dyn ImageRenderer>,
        directory: Arc<dyn AthleteDirectory>,
    ) -> Self {
        let tracks = config.tracks;
        // No pause needed between lookups that never leave the process
        let lookup_delay = if config.athlete_api_url.is_some() {
            config.athlete_lookup_delay
        } else {
            Duration::ZERO
        };

        let mut registry = Self::new();
        registry
            .register(
                JobType::ProcessActivities,
                Arc::new(activities::ProcessActivities::new(tracks)),
            )
            .register(JobType::GenerateHeatmap, handler_fn(heatmap::generate_heatmap))
            .register(
                JobType::ProcessAthletes,
                Arc::new(athletes::ProcessAthletes::new(directory, lookup_delay)),
            )
            .register(
                JobType::GenerateActivityImages,
                Arc::new(images::GenerateActivityImages::new(tracks, renderer.clone())),
            )
            .register(
                JobType::GenerateRouteImages,
                Arc::new(images::GenerateRouteImages::new(renderer)),
            )
            .register(JobType::DataQualityScan, handler_fn(quality::data_quality_scan))
            .register(JobType::DataQualityFix, handler_fn(quality::data_quality_fix));
        registry
    }
}

/// Run synchronous file work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, JobError>
where
    F: FnOnce() -> Result<T, JobError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| JobError::Failed(format!("Blocking task failed: {e}")))?
}
