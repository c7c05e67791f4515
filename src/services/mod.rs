// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod athletes;
pub mod control;
pub mod dataset;
pub mod geometry;
pub mod quality;
pub mod queue;
pub mod render;
pub mod tracks;

pub use athletes::{AthleteDirectory, HttpAthleteDirectory, NoDirectory};
pub use control::{CancelToken, Cancelled, ProgressSink};
pub use dataset::DatasetService;
pub use quality::{FixOutcome, QualityError};
pub use queue::{JobQueue, QueueError, RunStateStore};
pub use render::{ImageRenderer, SvgRenderer};
