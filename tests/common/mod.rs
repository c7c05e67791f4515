// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use activity_vault::config::Config;
use activity_vault::jobs::JobRegistry;
use activity_vault::models::{JobState, JobType, RunStatus};
use activity_vault::routes::create_router;
use activity_vault::services::{JobQueue, NoDirectory, RunStateStore, SvgRenderer};
use activity_vault::store::{DatasetFolder, Datasets};
use activity_vault::AppState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub const USER: &str = "athlete-1";

/// Test config rooted in a temporary data directory.
#[allow(dead_code)]
pub fn test_config(data_dir: &Path) -> Config {
    let mut config = Config::test_default();
    config.data_dir = data_dir.to_path_buf();
    config
}

/// Default handlers, offline athlete directory.
#[allow(dead_code)]
pub fn standard_registry(config: &Config) -> JobRegistry {
    JobRegistry::standard(config, Arc::new(SvgRenderer::default()), Arc::new(NoDirectory))
}

/// Start a queue over a fresh data directory.
#[allow(dead_code)]
pub fn start_queue(registry: JobRegistry) -> (TempDir, JobQueue) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let queue = JobQueue::start(
        Datasets::new(dir.path()),
        registry,
        Arc::new(RunStateStore::new()),
    );
    (dir, queue)
}

/// The dataset folder of `USER`, created on disk.
#[allow(dead_code)]
pub fn user_folder(dir: &TempDir) -> DatasetFolder {
    let folder = Datasets::new(dir.path())
        .folder_for(USER)
        .expect("Valid user id");
    std::fs::create_dir_all(folder.root()).expect("Failed to create dataset folder");
    folder
}

/// Write a file into the user's dataset folder.
#[allow(dead_code)]
pub fn write_file(dir: &TempDir, relative: &str, contents: &str) {
    let path = user_folder(dir).path(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(path, contents).expect("Failed to write fixture");
}

/// Poll until a key is stopped again, returning its final state.
#[allow(dead_code)]
pub async fn wait_until_stopped(queue: &JobQueue, job_type: JobType, user_id: &str) -> JobState {
    for _ in 0..500 {
        if queue.status(job_type, user_id) == RunStatus::Stopped {
            return queue.state(job_type, user_id);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{job_type} did not stop in time");
}

/// Create a test app over a temporary data directory.
/// Returns the router, the shared state and the directory guard.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(dir.path());
    let datasets = Datasets::new(dir.path());
    let queue = JobQueue::start(
        datasets.clone(),
        standard_registry(&config),
        Arc::new(RunStateStore::new()),
    );

    let state = Arc::new(AppState {
        config,
        datasets,
        queue,
    });

    (create_router(state.clone()), state, dir)
}
