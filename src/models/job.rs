// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Background job types, entries and per-key run state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// The closed set of background jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ProcessActivities,
    GenerateHeatmap,
    ProcessAthletes,
    GenerateActivityImages,
    GenerateRouteImages,
    DataQualityScan,
    DataQualityFix,
}

impl JobType {
    pub const ALL: [JobType; 7] = [
        JobType::ProcessActivities,
        JobType::GenerateHeatmap,
        JobType::ProcessAthletes,
        JobType::GenerateActivityImages,
        JobType::GenerateRouteImages,
        JobType::DataQualityScan,
        JobType::DataQualityFix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::ProcessActivities => "process_activities",
            JobType::GenerateHeatmap => "generate_heatmap",
            JobType::ProcessAthletes => "process_athletes",
            JobType::GenerateActivityImages => "generate_activity_images",
            JobType::GenerateRouteImages => "generate_route_images",
            JobType::DataQualityScan => "data_quality_scan",
            JobType::DataQualityFix => "data_quality_fix",
        }
    }

    /// Human readable name for status listings.
    pub fn display_name(self) -> &'static str {
        match self {
            JobType::ProcessActivities => "Process activities",
            JobType::GenerateHeatmap => "Generate heatmap",
            JobType::ProcessAthletes => "Process athletes",
            JobType::GenerateActivityImages => "Generate activity images",
            JobType::GenerateRouteImages => "Generate route images",
            JobType::DataQualityScan => "Data quality scan",
            JobType::DataQualityFix => "Data quality fix",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized job type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown job type: {0}")]
pub struct UnknownJobType(pub String);

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownJobType(s.to_string()))
    }
}

/// Run state of one (job type, user) key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Stopped,
    Queued,
    Running,
}

impl RunStatus {
    /// Queued or running.
    pub fn is_active(self) -> bool {
        self != RunStatus::Stopped
    }
}

/// Payload key naming the fix action of a `DataQualityFix` entry.
pub const PAYLOAD_ACTION: &str = "action";

/// A unit of work handed to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    pub user_id: String,
    pub job_type: JobType,
    /// Human readable description, for logs
    pub body: String,
    #[serde(default)]
    pub payload: Option<BTreeMap<String, String>>,
}

impl JobEntry {
    pub fn new(user_id: &str, job_type: JobType, body: impl Into<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            job_type,
            body: body.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: BTreeMap<String, String>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn payload_value(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key).map(String::as_str)
    }
}

/// Point-in-time state of a key, as shown to pollers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub status: RunStatus,
    /// 0-100 while running
    pub percentage: Option<u8>,
    pub updated_at: Option<String>,
    pub started_at: Option<String>,
    /// Message of the last failed run, kept until the next run starts
    pub error: Option<String>,
}

/// One row of the per-user job listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JobSummary {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub name: String,
    pub state: JobState,
}
