// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Media rows from the exported `media.csv` table.

use crate::services::tracks::{media_basename_key, numeric_runs};
use crate::store::{Column, TableRecord};

/// Minimum length of a digit run treated as an activity id.
pub const MIN_ID_DIGITS: usize = 5;

/// One photo or attachment. Linkage to an activity is inferred from the
/// file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MediaRecord {
    /// Relative path of the media file (e.g. `media/12345_trip.jpg`)
    pub filename: String,
    pub caption: String,
    /// Unknown columns, in file order
    pub extras: Vec<String>,
}

impl MediaRecord {
    pub fn new(filename: &str, caption: &str) -> Self {
        Self {
            filename: filename.to_string(),
            caption: caption.to_string(),
            extras: Vec::new(),
        }
    }

    /// Digit runs long enough to be activity ids.
    pub fn candidate_ids(&self) -> Vec<&str> {
        numeric_runs(&self.filename, MIN_ID_DIGITS)
    }

    /// Lowercased basename without extension.
    pub fn basename_key(&self) -> String {
        media_basename_key(&self.filename)
    }

    /// Identity used when merging quarantined rows.
    pub fn identity(&self) -> (&str, &str) {
        (&self.filename, &self.caption)
    }
}

impl TableRecord for MediaRecord {
    const COLUMNS: &'static [Column] = &[
        Column {
            name: "filename",
            aliases: &["Media Filename"],
        },
        Column {
            name: "caption",
            aliases: &["Media Caption"],
        },
    ];

    fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.filename,
            _ => &self.caption,
        }
    }

    fn field_mut(&mut self, index: usize) -> &mut String {
        match index {
            0 => &mut self.filename,
            _ => &mut self.caption,
        }
    }

    fn extras(&self) -> &[String] {
        &self.extras
    }

    fn extras_mut(&mut self) -> &mut Vec<String> {
        &mut self.extras
    }
}
