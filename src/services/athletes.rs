// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Athlete profile lookups for the connections tables.

use crate::models::AthleteProfile;
use futures_util::future::{BoxFuture, FutureExt};
use std::time::Duration;

/// Errors from an athlete lookup.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Athlete lookup failed: {0}")]
    Request(String),

    #[error("Athlete directory rate limit hit")]
    RateLimited,

    #[error("Athlete directory returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Source of public athlete profiles.
pub trait AthleteDirectory: Send + Sync {
    /// Look up one athlete; `Ok(None)` when the directory does not know it.
    fn lookup<'a>(
        &'a self,
        athlete_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<AthleteProfile>, DirectoryError>>;
}

/// Directory used when no lookup service is configured: knows nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

impl AthleteDirectory for NoDirectory {
    fn lookup<'a>(
        &'a self,
        _athlete_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<AthleteProfile>, DirectoryError>> {
        futures_util::future::ready(Ok(None)).boxed()
    }
}

/// Directory served over HTTP at `{base_url}/athletes/{id}`.
#[derive(Clone)]
pub struct HttpAthleteDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAthleteDirectory {
    pub fn new(base_url: &str) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DirectoryError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, athlete_id: &str) -> String {
        format!(
            "{}/athletes/{}",
            self.base_url,
            urlencoding::encode(athlete_id.trim())
        )
    }

    async fn fetch(&self, athlete_id: &str) -> Result<Option<AthleteProfile>, DirectoryError> {
        let response = self
            .http
            .get(self.url(athlete_id))
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if status.as_u16() == 429 {
            tracing::warn!("Athlete directory rate limit hit (429)");
            return Err(DirectoryError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| DirectoryError::Request(format!("JSON parse error: {}", e)))
    }
}

impl AthleteDirectory for HttpAthleteDirectory {
    fn lookup<'a>(
        &'a self,
        athlete_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<AthleteProfile>, DirectoryError>> {
        self.fetch(athlete_id).boxed()
    }
}
