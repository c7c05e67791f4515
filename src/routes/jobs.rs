// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Job control routes: list, status, enqueue and stop.

use crate::error::{AppError, Result};
use crate::middleware::RequestUser;
use crate::models::job::PAYLOAD_ACTION;
use crate::models::{FixAction, JobEntry, JobSummary, JobType, RunStatus};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route(
            "/api/jobs/{job_type}",
            get(job_status).post(enqueue_job).delete(stop_job),
        )
}

fn parse_job_type(raw: &str) -> Result<JobType> {
    raw.parse()
        .map_err(|e: crate::models::job::UnknownJobType| AppError::NotFound(e.to_string()))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<RequestUser>,
) -> Json<Vec<JobSummary>> {
    Json(state.queue.list(&user.user_id))
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<RequestUser>,
    Path(job_type): Path<String>,
) -> Result<Json<JobSummary>> {
    let job_type = parse_job_type(&job_type)?;
    Ok(Json(JobSummary {
        job_type,
        name: job_type.display_name().to_string(),
        state: state.queue.state(job_type, &user.user_id),
    }))
}

/// Optional body of an enqueue request.
#[derive(Debug, Default, Deserialize)]
pub struct EnqueueRequest {
    /// Description for logs
    pub body: Option<String>,
    pub payload: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EnqueueResponse {
    pub queued: bool,
    pub status: RunStatus,
}

/// Queue an entry; 202 when queued, 409 when the job is already in flight.
pub(crate) fn submit(state: &AppState, entry: JobEntry) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    let job_type = entry.job_type;
    let user_id = entry.user_id.clone();
    if !state.queue.enqueue(entry)? {
        return Err(AppError::Conflict(format!(
            "{job_type} is already {:?}",
            state.queue.status(job_type, &user_id)
        )));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            queued: true,
            status: state.queue.status(job_type, &user_id),
        }),
    ))
}

async fn enqueue_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<RequestUser>,
    Path(job_type): Path<String>,
    request: Option<Json<EnqueueRequest>>,
) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    let job_type = parse_job_type(&job_type)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();

    // Reject a fix without a usable action before it reaches the queue
    if job_type == JobType::DataQualityFix {
        let action = request
            .payload
            .as_ref()
            .and_then(|p| p.get(PAYLOAD_ACTION))
            .ok_or_else(|| AppError::BadRequest("Missing fix action".to_string()))?;
        action
            .parse::<FixAction>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
    }

    let body = request
        .body
        .unwrap_or_else(|| format!("{} requested", job_type.display_name()));
    let mut entry = JobEntry::new(&user.user_id, job_type, body);
    if let Some(payload) = request.payload {
        entry = entry.with_payload(payload);
    }
    submit(&state, entry)
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StopResponse {
    /// Status the job had when the stop was requested
    pub previous: RunStatus,
    pub status: RunStatus,
}

async fn stop_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<RequestUser>,
    Path(job_type): Path<String>,
) -> Result<Json<StopResponse>> {
    let job_type = parse_job_type(&job_type)?;
    let previous = state.queue.force_stop(&user.user_id, job_type);
    Ok(Json(StopResponse {
        previous,
        status: state.queue.status(job_type, &user.user_id),
    }))
}
