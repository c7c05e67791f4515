// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data quality report and fix routes.

use super::jobs::{submit, EnqueueResponse};
use crate::error::{AppError, Result};
use crate::middleware::RequestUser;
use crate::models::job::PAYLOAD_ACTION;
use crate::models::{FixAction, JobEntry, JobType, QualityReport};
use crate::services::DatasetService;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/quality/report", get(get_report))
        .route("/api/quality/fix", post(request_fix))
}

/// The last stored report; 404 until a scan has run.
async fn get_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<RequestUser>,
) -> Result<Json<QualityReport>> {
    let folder = state.datasets.folder_for(&user.user_id)?;
    DatasetService::new(folder)
        .read_report()?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No data quality report yet".to_string()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct FixRequest {
    #[validate(length(min = 1, max = 64))]
    pub action: String,
}

async fn request_fix(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<RequestUser>,
    Json(request): Json<FixRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let action: FixAction = request
        .action
        .parse()
        .map_err(|e: crate::models::quality::UnknownFixAction| AppError::BadRequest(e.to_string()))?;

    tracing::info!(user_id = %user.user_id, action = %action, "Data quality fix requested");
    let entry = JobEntry::new(&user.user_id, JobType::DataQualityFix, format!("Apply {action}"))
        .with_payload(BTreeMap::from([(
            PAYLOAD_ACTION.to_string(),
            action.as_str().to_string(),
        )]));
    submit(&state, entry)
}
