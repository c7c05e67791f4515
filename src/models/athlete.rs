// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Athlete connections (`followers.csv`, `following.csv`) and looked-up profiles.

use crate::store::{Column, TableRecord};
use serde::{Deserialize, Serialize};

/// One row of a connections table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AthleteLinkRecord {
    pub athlete_id: String,
    pub extras: Vec<String>,
}

impl TableRecord for AthleteLinkRecord {
    const COLUMNS: &'static [Column] = &[Column {
        name: "athlete_id",
        aliases: &["Athlete ID", "id"],
    }];

    fn field(&self, _index: usize) -> &str {
        &self.athlete_id
    }

    fn field_mut(&mut self, _index: usize) -> &mut String {
        &mut self.athlete_id
    }

    fn extras(&self) -> &[String] {
        &self.extras
    }

    fn extras_mut(&mut self) -> &mut Vec<String> {
        &mut self.extras
    }
}

/// Public profile returned by the athlete directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    /// Profile picture URL
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Entry of the `athletes.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AthleteEntry {
    pub id: String,
    /// "follower", "following", or both
    pub relations: Vec<String>,
    pub profile: Option<AthleteProfile>,
}

/// The `athletes.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AthletesArtifact {
    pub generated_at: String,
    pub athletes: Vec<AthleteEntry>,
}
