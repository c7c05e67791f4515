// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity Vault API Server
//!
//! Serves job control and data quality endpoints and runs the background
//! job worker for every user's dataset folder.

use activity_vault::{
    config::Config,
    jobs::JobRegistry,
    services::{
        AthleteDirectory, HttpAthleteDirectory, JobQueue, NoDirectory, RunStateStore, SvgRenderer,
    },
    store::Datasets,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Activity Vault API");

    std::fs::create_dir_all(&config.data_dir)?;
    let datasets = Datasets::new(config.data_dir.clone());
    tracing::info!(path = %config.data_dir.display(), "Dataset root ready");

    let directory: Arc<dyn AthleteDirectory> = match &config.athlete_api_url {
        Some(url) => {
            tracing::info!(url = %url, "Athlete directory configured");
            Arc::new(HttpAthleteDirectory::new(url).expect("Failed to build HTTP client"))
        }
        None => {
            tracing::info!("No athlete directory configured, profiles will be empty");
            Arc::new(NoDirectory)
        }
    };

    let registry = JobRegistry::standard(&config, Arc::new(SvgRenderer::default()), directory);
    let queue = JobQueue::start(datasets.clone(), registry, Arc::new(RunStateStore::new()));
    tracing::info!("Job queue started");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        datasets,
        queue,
    });

    // Build router
    let app = activity_vault::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("activity_vault=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
