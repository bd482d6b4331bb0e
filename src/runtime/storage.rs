//! Response storage on disk.
//!
//! Each response is written as one pretty-printed JSON document so that
//! `<> path` links in request files can point at it.

use super::error::StorageError;
use super::ResponseStorage;
use crate::models::StoredResponse;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Stores responses as JSON files inside a directory.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Creates a storage rooted at `dir`. The directory is created on the
    /// first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a response: request name (or `response`) plus the
    /// capture timestamp.
    fn file_name(response: &StoredResponse, attempt: usize) -> String {
        let stem: String = response
            .request_name
            .as_deref()
            .unwrap_or("response")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let stamp = response.saved_at.format("%Y%m%dT%H%M%S%.3f");
        if attempt == 0 {
            format!("{}-{}.json", stem, stamp)
        } else {
            format!("{}-{}-{}.json", stem, stamp, attempt)
        }
    }
}

impl ResponseStorage for DirectoryStorage {
    fn save(&self, response: &StoredResponse) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::Io {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        let mut attempt = 0;
        let path = loop {
            let candidate = self.dir.join(Self::file_name(response, attempt));
            if !candidate.exists() {
                break candidate;
            }
            attempt += 1;
        };

        let json = serde_json::to_string_pretty(response).map_err(|e| {
            StorageError::Serialization {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        fs::write(&path, json).map_err(|e| StorageError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;

        debug!("saved response to {}", path.display());
        Ok(path)
    }

    fn load(&self, path: &Path) -> Result<StoredResponse, StorageError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        };
        let content = fs::read_to_string(&path).map_err(|e| StorageError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| StorageError::Serialization {
            path,
            message: e.to_string(),
        })
    }
}
