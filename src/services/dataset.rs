// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read/write façade over one dataset folder, used by the job bodies.

use crate::config::files;
use crate::models::{ActivityRecord, AthleteLinkRecord, MediaRecord, QualityReport};
use crate::services::tracks::{is_track_file, load_track, TrackError, TrackIndex};
use crate::store::{DatasetFolder, StoreError, Table};
use geojson::FeatureCollection;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Property names on stored route features.
pub mod route_props {
    pub const ACTIVITY_ID: &str = "activity_id";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const POLYLINE: &str = "polyline";
}

/// A simplified route read back from `routes/`.
#[derive(Debug, Clone)]
pub struct StoredRoute {
    /// File key the route was stored under
    pub key: String,
    pub collection: FeatureCollection,
}

impl StoredRoute {
    /// String property of the first feature that has it.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.collection
            .features
            .iter()
            .find_map(|f| f.property(name).and_then(|v| v.as_str()))
    }

    /// Activity type, `"other"` when unknown.
    pub fn activity_type(&self) -> &str {
        self.property(route_props::TYPE)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("other")
    }
}

/// Dataset access for one user. Cheap to clone; the track index is built
/// on first use and shared between clones.
#[derive(Debug, Clone)]
pub struct DatasetService {
    folder: DatasetFolder,
    tracks: Arc<OnceLock<TrackIndex>>,
}

/// A relative path that stays inside the dataset folder.
fn is_contained(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl DatasetService {
    pub fn new(folder: DatasetFolder) -> Self {
        Self {
            folder,
            tracks: Arc::new(OnceLock::new()),
        }
    }

    pub fn folder(&self) -> &DatasetFolder {
        &self.folder
    }

    pub fn activities(&self) -> Result<Table<ActivityRecord>, StoreError> {
        self.folder.read(files::ACTIVITIES)
    }

    pub fn media(&self) -> Result<Table<MediaRecord>, StoreError> {
        self.folder.read(files::MEDIA)
    }

    /// `followers.csv` or `following.csv`.
    pub fn athlete_links(&self, file_name: &str) -> Result<Table<AthleteLinkRecord>, StoreError> {
        self.folder.read(file_name)
    }

    /// Track files under `activities/`, indexed by file key.
    pub fn track_index(&self) -> Result<&TrackIndex, StoreError> {
        if let Some(index) = self.tracks.get() {
            return Ok(index);
        }
        let dir = self.folder.path(files::TRACKS_DIR);
        let index = TrackIndex::scan(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(self.tracks.get_or_init(|| index))
    }

    /// Track file of an activity: the file it names if present, otherwise
    /// any track file with the same file key.
    pub fn track_path(&self, activity: &ActivityRecord) -> Result<Option<PathBuf>, StoreError> {
        let filename = activity.filename.trim();
        if !filename.is_empty() && is_track_file(filename) && is_contained(filename) {
            let direct = self.folder.path(filename);
            if direct.is_file() {
                return Ok(Some(direct));
            }
        }
        Ok(self
            .track_index()?
            .get(&activity.file_key())
            .map(Path::to_path_buf))
    }

    /// Parse an activity's track, `None` when it has no track file.
    pub fn load_track(
        &self,
        activity: &ActivityRecord,
    ) -> Result<Option<FeatureCollection>, TrackError> {
        match self.track_path(activity)? {
            Some(path) => load_track(&path).map(Some),
            None => Ok(None),
        }
    }

    fn route_path(key: &str) -> String {
        format!("{}/{key}.geojson", files::ROUTES_DIR)
    }

    pub fn save_route(&self, key: &str, collection: &FeatureCollection) -> Result<(), StoreError> {
        self.folder.write_json(&Self::route_path(key), collection)
    }

    /// Every stored route, sorted by key. Unreadable files are skipped.
    pub fn routes(&self) -> Result<Vec<StoredRoute>, StoreError> {
        let dir = self.folder.path(files::ROUTES_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut routes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(|n| n.strip_suffix(".geojson")) else {
                continue;
            };
            match self.folder.read_json::<FeatureCollection>(&Self::route_path(key)) {
                Ok(Some(collection)) => routes.push(StoredRoute {
                    key: key.to_string(),
                    collection,
                }),
                Ok(None) => {}
                Err(e) => tracing::warn!(route = key, error = %e, "Skipping unreadable route"),
            }
        }
        routes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(routes)
    }

    pub fn write_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<(), StoreError> {
        self.folder.write_json(relative, value)
    }

    /// Write a text artifact such as a rendered image.
    pub fn write_text(&self, relative: &str, contents: &str) -> Result<(), StoreError> {
        crate::store::write_replacing(&self.folder.path(relative), contents.as_bytes())
    }

    /// The last quality report, if a scan ever ran.
    pub fn read_report(&self) -> Result<Option<QualityReport>, StoreError> {
        self.folder.read_json(files::QUALITY_REPORT)
    }
}
