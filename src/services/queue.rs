// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process job queue with per-user, per-type single-flight.
//!
//! Every (job type, user) key moves through `stopped -> queued -> running
//! -> stopped`. Enqueue only succeeds from `stopped`, so at most one entry
//! per key is in flight. A single worker task drains the channel and runs
//! jobs one at a time, in arrival order.

use crate::jobs::{JobError, JobRegistry, JobRun};
use crate::models::{JobEntry, JobState, JobSummary, JobType, RunStatus};
use crate::services::control::{CancelToken, ProgressSink};
use crate::services::dataset::DatasetService;
use crate::store::{is_valid_user_id, Datasets, StoreError};
use crate::time_utils::format_utc_millis;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job worker is not running")]
    WorkerGone,
}

#[derive(Debug, Default)]
struct Slot {
    state: JobState,
    /// Ticket of the entry currently queued or running
    ticket: u64,
    cancel: Option<CancelToken>,
}

type Key = (JobType, String);

fn key(job_type: JobType, user_id: &str) -> Key {
    (job_type, user_id.to_string())
}

fn now() -> Option<String> {
    Some(format_utc_millis(chrono::Utc::now()))
}

/// Run state of every (job type, user) key.
///
/// Owned by the queue; shared with progress sinks so running jobs can
/// report percentages.
#[derive(Debug, Default)]
pub struct RunStateStore {
    slots: DashMap<Key, Slot>,
    next_ticket: AtomicU64,
}

impl RunStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a key from `stopped` to `queued`. Returns the ticket of the new
    /// entry, or `None` when the key is already queued or running.
    pub fn try_queue(&self, job_type: JobType, user_id: &str) -> Option<u64> {
        let mut slot = self.slots.entry(key(job_type, user_id)).or_default();
        if slot.state.status.is_active() {
            return None;
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        slot.ticket = ticket;
        slot.state.status = RunStatus::Queued;
        slot.state.percentage = None;
        slot.state.updated_at = now();
        Some(ticket)
    }

    /// Move a queued key to `running`. Returns false when the entry is
    /// stale: stopped while queued, or superseded by a newer entry.
    pub(crate) fn begin_run(
        &self,
        job_type: JobType,
        user_id: &str,
        ticket: u64,
        cancel: CancelToken,
    ) -> bool {
        let Some(mut slot) = self.slots.get_mut(&key(job_type, user_id)) else {
            return false;
        };
        if slot.state.status != RunStatus::Queued || slot.ticket != ticket {
            return false;
        }
        let started = now();
        slot.cancel = Some(cancel);
        slot.state = JobState {
            status: RunStatus::Running,
            percentage: Some(0),
            updated_at: started.clone(),
            started_at: started,
            error: None,
        };
        true
    }

    /// Return a key to `stopped`, dropping progress and keeping `error`
    /// until the next run starts.
    pub(crate) fn finish(&self, job_type: JobType, user_id: &str, ticket: u64, error: Option<String>) {
        if let Some(mut slot) = self.slots.get_mut(&key(job_type, user_id)) {
            if slot.ticket != ticket {
                return;
            }
            slot.cancel = None;
            slot.state.status = RunStatus::Stopped;
            slot.state.percentage = None;
            slot.state.updated_at = now();
            slot.state.error = error;
        }
    }

    /// Record progress of a running key. Ignored for other states.
    pub fn set_progress(&self, job_type: JobType, user_id: &str, percentage: u8) {
        if let Some(mut slot) = self.slots.get_mut(&key(job_type, user_id)) {
            if slot.state.status == RunStatus::Running {
                slot.state.percentage = Some(percentage.min(100));
                slot.state.updated_at = now();
            }
        }
    }

    /// Stop a key. A queued entry is dropped when the worker reaches it; a
    /// running job has its cancel token set. Returns the status seen.
    pub fn request_stop(&self, job_type: JobType, user_id: &str) -> RunStatus {
        let Some(mut slot) = self.slots.get_mut(&key(job_type, user_id)) else {
            return RunStatus::Stopped;
        };
        let status = slot.state.status;
        match status {
            RunStatus::Queued => {
                slot.state.status = RunStatus::Stopped;
                slot.state.updated_at = now();
            }
            RunStatus::Running => {
                if let Some(cancel) = &slot.cancel {
                    cancel.cancel();
                }
            }
            RunStatus::Stopped => {}
        }
        status
    }

    pub fn status(&self, job_type: JobType, user_id: &str) -> RunStatus {
        self.slots
            .get(&key(job_type, user_id))
            .map(|slot| slot.state.status)
            .unwrap_or_default()
    }

    /// Point-in-time copy of a key's state.
    pub fn snapshot(&self, job_type: JobType, user_id: &str) -> JobState {
        self.slots
            .get(&key(job_type, user_id))
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    /// Reset every queued or running key to `stopped`. Returns how many
    /// keys were reset.
    pub fn reset_all(&self) -> usize {
        let mut reset = 0;
        for mut slot in self.slots.iter_mut() {
            if slot.state.status.is_active() {
                slot.cancel = None;
                slot.state.status = RunStatus::Stopped;
                slot.state.percentage = None;
                slot.state.updated_at = now();
                reset += 1;
            }
        }
        reset
    }
}

struct Dispatch {
    entry: JobEntry,
    ticket: u64,
}

/// Handle on the queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    states: Arc<RunStateStore>,
    datasets: Datasets,
    sender: mpsc::UnboundedSender<Dispatch>,
}

impl JobQueue {
    /// Sweep stale state and spawn the worker task. Must be called from
    /// within a tokio runtime; the worker runs for the life of the runtime.
    pub fn start(datasets: Datasets, registry: JobRegistry, states: Arc<RunStateStore>) -> Self {
        let reset = states.reset_all();
        if reset > 0 {
            tracing::info!(count = reset, "Reset job state left from a previous run");
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            states,
            datasets,
            sender,
        };
        tokio::spawn(worker(queue.clone(), Arc::new(registry), receiver));
        queue
    }

    /// Queue a job. Returns `Ok(false)` without effect when a job of the
    /// same type is already queued or running for the user.
    pub fn enqueue(&self, entry: JobEntry) -> Result<bool, QueueError> {
        if !is_valid_user_id(&entry.user_id) {
            return Err(StoreError::InvalidUserId(entry.user_id).into());
        }

        let Some(ticket) = self.states.try_queue(entry.job_type, &entry.user_id) else {
            tracing::debug!(
                user_id = %entry.user_id,
                job = %entry.job_type,
                "Job already in flight, ignoring enqueue"
            );
            return Ok(false);
        };

        tracing::info!(
            user_id = %entry.user_id,
            job = %entry.job_type,
            body = %entry.body,
            "Job queued"
        );

        if let Err(mpsc::error::SendError(dispatch)) = self.sender.send(Dispatch { entry, ticket }) {
            let entry = dispatch.entry;
            self.states.finish(
                entry.job_type,
                &entry.user_id,
                ticket,
                Some(QueueError::WorkerGone.to_string()),
            );
            return Err(QueueError::WorkerGone);
        }
        Ok(true)
    }

    /// Ask a job to stop. Returns the status it had.
    pub fn force_stop(&self, user_id: &str, job_type: JobType) -> RunStatus {
        let status = self.states.request_stop(job_type, user_id);
        if status.is_active() {
            tracing::info!(user_id = %user_id, job = %job_type, ?status, "Stop requested");
        }
        status
    }

    pub fn status(&self, job_type: JobType, user_id: &str) -> RunStatus {
        self.states.status(job_type, user_id)
    }

    pub fn state(&self, job_type: JobType, user_id: &str) -> JobState {
        self.states.snapshot(job_type, user_id)
    }

    /// One summary per job type, in declaration order.
    pub fn list(&self, user_id: &str) -> Vec<JobSummary> {
        JobType::ALL
            .into_iter()
            .map(|job_type| JobSummary {
                job_type,
                name: job_type.display_name().to_string(),
                state: self.states.snapshot(job_type, user_id),
            })
            .collect()
    }

    pub fn datasets(&self) -> &Datasets {
        &self.datasets
    }

    async fn dispatch(&self, registry: &JobRegistry, dispatch: Dispatch) {
        let Dispatch { entry, ticket } = dispatch;
        let job_type = entry.job_type;
        let user_id = entry.user_id.clone();

        let cancel = CancelToken::new();
        if !self.states.begin_run(job_type, &user_id, ticket, cancel.clone()) {
            tracing::debug!(user_id = %user_id, job = %job_type, "Discarding stale job entry");
            return;
        }

        let Some(handler) = registry.get(job_type) else {
            tracing::error!(user_id = %user_id, job = %job_type, "No handler registered");
            self.states
                .finish(job_type, &user_id, ticket, Some(format!("No handler for {job_type}")));
            return;
        };

        let folder = match self.datasets.folder_for(&user_id) {
            Ok(folder) => folder,
            Err(e) => {
                self.states.finish(job_type, &user_id, ticket, Some(e.to_string()));
                return;
            }
        };

        tracing::info!(user_id = %user_id, job = %job_type, body = %entry.body, "Job started");
        let started = Instant::now();

        let run = JobRun {
            entry,
            dataset: DatasetService::new(folder),
            progress: ProgressSink::new(self.states.clone(), job_type, &user_id),
            cancel,
            queue: self.clone(),
        };

        // Spawned so a panicking body still resolves the key
        let outcome = tokio::spawn(handler.run(run)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(Ok(())) => {
                tracing::info!(user_id = %user_id, job = %job_type, duration_ms, "Job completed");
                None
            }
            Ok(Err(JobError::Cancelled)) => {
                tracing::info!(user_id = %user_id, job = %job_type, duration_ms, "Job cancelled");
                None
            }
            Ok(Err(e)) => {
                tracing::error!(
                    user_id = %user_id,
                    job = %job_type,
                    duration_ms,
                    error = %e,
                    "Job failed"
                );
                Some(e.to_string())
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    job = %job_type,
                    duration_ms,
                    error = %e,
                    "Job aborted"
                );
                Some(format!("Job aborted: {e}"))
            }
        };

        self.states.finish(job_type, &user_id, ticket, error);
    }
}

async fn worker(
    queue: JobQueue,
    registry: Arc<JobRegistry>,
    mut receiver: mpsc::UnboundedReceiver<Dispatch>,
) {
    tracing::info!("Job worker started");
    while let Some(dispatch) = receiver.recv().await {
        queue.dispatch(&registry, dispatch).await;
    }
    tracing::info!("Job worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "u1";

    #[test]
    fn single_flight_per_key() {
        let store = RunStateStore::new();
        assert!(store.try_queue(JobType::DataQualityScan, USER).is_some());
        assert!(store.try_queue(JobType::DataQualityScan, USER).is_none());
        // Other type and other user are independent keys
        assert!(store.try_queue(JobType::GenerateHeatmap, USER).is_some());
        assert!(store.try_queue(JobType::DataQualityScan, "u2").is_some());
    }

    #[test]
    fn stop_while_queued_makes_entry_stale() {
        let store = RunStateStore::new();
        let ticket = store.try_queue(JobType::DataQualityScan, USER).unwrap();
        assert_eq!(store.request_stop(JobType::DataQualityScan, USER), RunStatus::Queued);
        assert_eq!(store.status(JobType::DataQualityScan, USER), RunStatus::Stopped);
        assert!(!store.begin_run(JobType::DataQualityScan, USER, ticket, CancelToken::new()));
    }

    #[test]
    fn superseded_ticket_is_stale() {
        let store = RunStateStore::new();
        let old = store.try_queue(JobType::DataQualityScan, USER).unwrap();
        store.request_stop(JobType::DataQualityScan, USER);
        let new = store.try_queue(JobType::DataQualityScan, USER).unwrap();

        assert!(!store.begin_run(JobType::DataQualityScan, USER, old, CancelToken::new()));
        assert!(store.begin_run(JobType::DataQualityScan, USER, new, CancelToken::new()));
    }

    #[test]
    fn stop_while_running_sets_cancel_token() {
        let store = RunStateStore::new();
        let ticket = store.try_queue(JobType::ProcessActivities, USER).unwrap();
        let cancel = CancelToken::new();
        assert!(store.begin_run(JobType::ProcessActivities, USER, ticket, cancel.clone()));

        assert_eq!(store.request_stop(JobType::ProcessActivities, USER), RunStatus::Running);
        assert!(cancel.is_cancelled());
        // Still running until the body notices
        assert_eq!(store.status(JobType::ProcessActivities, USER), RunStatus::Running);
    }

    #[test]
    fn error_kept_until_next_run() {
        let store = RunStateStore::new();
        let ticket = store.try_queue(JobType::DataQualityFix, USER).unwrap();
        store.begin_run(JobType::DataQualityFix, USER, ticket, CancelToken::new());
        store.set_progress(JobType::DataQualityFix, USER, 40);
        store.finish(JobType::DataQualityFix, USER, ticket, Some("boom".into()));

        let state = store.snapshot(JobType::DataQualityFix, USER);
        assert_eq!(state.status, RunStatus::Stopped);
        assert_eq!(state.percentage, None);
        assert_eq!(state.error.as_deref(), Some("boom"));

        let ticket = store.try_queue(JobType::DataQualityFix, USER).unwrap();
        assert_eq!(store.snapshot(JobType::DataQualityFix, USER).error.as_deref(), Some("boom"));
        store.begin_run(JobType::DataQualityFix, USER, ticket, CancelToken::new());
        assert_eq!(store.snapshot(JobType::DataQualityFix, USER).error, None);
    }

    #[test]
    fn progress_ignored_unless_running() {
        let store = RunStateStore::new();
        store.set_progress(JobType::GenerateHeatmap, USER, 50);
        assert_eq!(store.snapshot(JobType::GenerateHeatmap, USER).percentage, None);
    }

    #[test]
    fn reset_all_stops_active_keys() {
        let store = RunStateStore::new();
        store.try_queue(JobType::GenerateHeatmap, USER);
        let ticket = store.try_queue(JobType::ProcessAthletes, USER).unwrap();
        store.begin_run(JobType::ProcessAthletes, USER, ticket, CancelToken::new());

        assert_eq!(store.reset_all(), 2);
        assert_eq!(store.status(JobType::GenerateHeatmap, USER), RunStatus::Stopped);
        assert_eq!(store.status(JobType::ProcessAthletes, USER), RunStatus::Stopped);
    }
}
