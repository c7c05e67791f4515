// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: per-user dataset folders holding CSV tables and artifacts.

pub mod table;

pub use table::{Column, Table, TableRecord};

use crate::config::files;
use crate::time_utils::backup_stamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Longest accepted user id.
pub const MAX_USER_ID_LEN: usize = 64;

/// Errors from dataset storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("JSON error in {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Resolves user ids to their dataset folders under a common root.
#[derive(Debug, Clone)]
pub struct Datasets {
    root: PathBuf,
}

impl Datasets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Dataset folder for a user. The id must be a single safe path component.
    pub fn folder_for(&self, user_id: &str) -> Result<DatasetFolder, StoreError> {
        if !is_valid_user_id(user_id) {
            return Err(StoreError::InvalidUserId(user_id.to_string()));
        }
        Ok(DatasetFolder::new(self.root.join(user_id)))
    }
}

/// Check that a user id is usable as a folder name.
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The per-user namespace holding one imported export and its derived artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFolder {
    root: PathBuf,
}

impl DatasetFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file relative to the dataset root.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(files::BACKUP_DIR)
    }

    /// Copy a table into the backup directory under a timestamped name.
    ///
    /// A missing source file is not an error: there is nothing to back up.
    pub fn backup(&self, file_name: &str) -> Result<Option<PathBuf>, StoreError> {
        let source = self.path(file_name);
        if !source.is_file() {
            tracing::debug!(file = file_name, "No table to back up");
            return Ok(None);
        }

        let dir = self.backup_dir();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let target = dir.join(format!("{}-{}", backup_stamp(chrono::Utc::now()), file_name));
        fs::copy(&source, &target).map_err(|e| StoreError::io(&source, e))?;

        tracing::info!(
            file = file_name,
            backup = %target.display(),
            "Table backed up"
        );
        Ok(Some(target))
    }

    /// Serialize a value as pretty JSON, replacing any previous file.
    pub fn write_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path(relative);
        let body = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Json {
            path: path.clone(),
            message: e.to_string(),
        })?;
        write_replacing(&path, &body)
    }

    /// Read a JSON artifact, `None` when it does not exist yet.
    pub fn read_json<T: DeserializeOwned>(&self, relative: &str) -> Result<Option<T>, StoreError> {
        let path = self.path(relative);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| StoreError::Json {
                path,
                message: e.to_string(),
            })
    }
}

/// Write a whole file through a sibling temp file and a rename.
pub(crate) fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}
