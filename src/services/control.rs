// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cooperative progress reporting and cancellation for running jobs.

use crate::models::JobType;
use crate::services::queue::RunStateStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Raised by a job body that observed a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Job cancelled")]
pub struct Cancelled;

/// Stop flag shared between the queue and one running job.
///
/// Cancellation is advisory: the body must call `check` at safe points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// `Err(Cancelled)` once a stop was requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress sink of one running job, writing 0-100 into the run state.
#[derive(Clone, Default)]
pub struct ProgressSink {
    target: Option<(Arc<RunStateStore>, JobType, String)>,
}

impl ProgressSink {
    pub(crate) fn new(states: Arc<RunStateStore>, job_type: JobType, user_id: &str) -> Self {
        Self {
            target: Some((states, job_type, user_id.to_string())),
        }
    }

    /// A sink that discards updates.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Report a percentage; values above 100 are clamped.
    pub fn report(&self, percentage: u8) {
        if let Some((states, job_type, user_id)) = &self.target {
            states.set_progress(*job_type, user_id, percentage.min(100));
        }
    }

    /// Report `done / total` mapped into `[from, to]`.
    pub fn report_fraction(&self, done: usize, total: usize, from: u8, to: u8) {
        let span = to.saturating_sub(from) as usize;
        let step = if total == 0 { span } else { span * done.min(total) / total };
        self.report(from.saturating_add(step as u8));
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some((_, job_type, user_id)) => f
                .debug_struct("ProgressSink")
                .field("job_type", job_type)
                .field("user_id", user_id)
                .finish(),
            None => f.write_str("ProgressSink(noop)"),
        }
    }
}
