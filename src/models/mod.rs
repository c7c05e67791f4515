// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod athlete;
pub mod job;
pub mod media;
pub mod quality;

pub use activity::ActivityRecord;
pub use athlete::{AthleteLinkRecord, AthleteProfile};
pub use job::{JobEntry, JobState, JobSummary, JobType, RunStatus};
pub use media::MediaRecord;
pub use quality::{FixAction, IssueKey, QualityIssue, QualityReport, Severity};
