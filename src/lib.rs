// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity Vault: background processing for exported activity archives
//!
//! This crate maintains derived artifacts (routes, heatmap, images, data
//! quality reports) for each user's imported export through a per-user,
//! per-job-type background queue.

pub mod config;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use config::Config;
use services::JobQueue;
use store::Datasets;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub datasets: Datasets,
    pub queue: JobQueue,
}
