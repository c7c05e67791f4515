// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Track file discovery and loading.
//!
//! Activities reference their track by a relative file name such as
//! `activities/123.fit.gz`. Matching works on a normalized "file key": the
//! basename without `.gz` and without the track extension.

use crate::services::geometry::{parse_track, GeometryError, TrackFormat};
use crate::store::StoreError;
use flate2::read::GzDecoder;
use geojson::FeatureCollection;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Extensions of the formats `parse_track` reads.
const TRACK_EXTENSIONS: &[&str] = &[".gpx", ".fit"];

/// Last path component, accepting both separators.
fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let split = value.len().checked_sub(suffix.len())?;
    if !value.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = value.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Normalized key of a track file name: basename, `.gz` and track extension removed.
pub fn track_file_key(file_name: &str) -> String {
    let mut key = basename(file_name);
    if let Some(stripped) = strip_suffix_ignore_case(key, ".gz") {
        key = stripped;
    }
    for ext in TRACK_EXTENSIONS {
        if let Some(stripped) = strip_suffix_ignore_case(key, ext) {
            key = stripped;
            break;
        }
    }
    key.to_ascii_lowercase()
}

/// File key of an activity, falling back to its id when no file is named.
pub fn activity_file_key(filename: &str, id: &str) -> String {
    if filename.trim().is_empty() {
        id.trim().to_ascii_lowercase()
    } else {
        track_file_key(filename)
    }
}

/// Lowercased basename of a media file without its extension.
pub fn media_basename_key(file_name: &str) -> String {
    let name = basename(file_name);
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    stem.to_ascii_lowercase()
}

/// Runs of ASCII digits at least `min_len` long.
pub fn numeric_runs(value: &str, min_len: usize) -> Vec<&str> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() >= min_len)
        .collect()
}

/// Whether a file name looks like a track file (optionally gzipped).
pub fn is_track_file(file_name: &str) -> bool {
    let mut name = basename(file_name);
    if let Some(stripped) = strip_suffix_ignore_case(name, ".gz") {
        name = stripped;
    }
    TRACK_EXTENSIONS
        .iter()
        .any(|ext| strip_suffix_ignore_case(name, ext).is_some())
}

/// Track files present on disk, by file key.
#[derive(Debug, Clone, Default)]
pub struct TrackIndex {
    by_key: HashMap<String, PathBuf>,
}

impl TrackIndex {
    /// Index every track file directly inside `dir`. A missing directory
    /// yields an empty index.
    pub fn scan(dir: &Path) -> std::io::Result<Self> {
        let mut by_key = HashMap::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_track_file(name) && entry.path().is_file() {
                by_key
                    .entry(track_file_key(name))
                    .or_insert_with(|| entry.path());
            }
        }

        Ok(Self { by_key })
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.by_key.get(key).map(PathBuf::as_path)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Read a track file, gunzipping `.gz` files, and detect its format.
pub fn read_track_file(path: &Path) -> std::io::Result<(Vec<u8>, Option<TrackFormat>)> {
    let raw = fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let bytes = if strip_suffix_ignore_case(name, ".gz").is_some() {
        let mut decoded = Vec::with_capacity(raw.len() * 4);
        GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
        decoded
    } else {
        raw
    };

    Ok((bytes, TrackFormat::from_path(name)))
}

/// Errors from loading a track file.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Failed to read track {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read and parse a track file into a feature collection.
pub fn load_track(path: &Path) -> Result<FeatureCollection, TrackError> {
    let (bytes, format) = read_track_file(path).map_err(|source| TrackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = format
        .ok_or_else(|| GeometryError::UnsupportedFormat(path.display().to_string()))?;
    Ok(parse_track(&bytes, format)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn file_keys() {
        assert_eq!(track_file_key("activities/123.fit.gz"), "123");
        assert_eq!(track_file_key("activities\\Morning_Ride.GPX"), "morning_ride");
        assert_eq!(track_file_key("456.fit.GZ"), "456");
        assert_eq!(track_file_key("456.tcx.gz"), "456.tcx");
        assert_eq!(track_file_key("notes.txt"), "notes.txt");
        assert_eq!(activity_file_key("", " 77 "), "77");
    }

    #[test]
    fn media_keys() {
        assert_eq!(media_basename_key("media/12345_trip.jpg"), "12345_trip");
        assert_eq!(media_basename_key(".hidden"), ".hidden");
        assert_eq!(media_basename_key("noext"), "noext");
    }

    #[test]
    fn digit_runs() {
        assert_eq!(numeric_runs("a12345b678901c12", 5), vec!["12345", "678901"]);
        assert!(numeric_runs("1234", 5).is_empty());
    }

    #[test]
    fn index_and_read_gzipped_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42.gpx.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"<gpx/>").unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();
        fs::write(dir.path().join("readme.md"), "x").unwrap();

        let index = TrackIndex::scan(dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains("42"));

        let (bytes, format) = read_track_file(index.get("42").unwrap()).unwrap();
        assert_eq!(bytes, b"<gpx/>");
        assert_eq!(format, Some(TrackFormat::Gpx));
    }

    #[test]
    fn tcx_is_not_a_track_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("7.tcx");
        fs::write(&path, "<TrainingCenterDatabase/>").unwrap();
        fs::write(dir.path().join("8.tcx.gz"), "").unwrap();

        assert!(!is_track_file("7.tcx"));
        assert!(!is_track_file("activities/8.tcx.gz"));
        assert!(TrackIndex::scan(dir.path()).unwrap().is_empty());
        assert!(matches!(
            load_track(&path),
            Err(TrackError::Geometry(GeometryError::UnsupportedFormat(_)))
        ));
    }

    #[test]
    fn missing_dir_is_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrackIndex::scan(&dir.path().join("nope")).unwrap();
        assert!(index.is_empty());
    }
}
