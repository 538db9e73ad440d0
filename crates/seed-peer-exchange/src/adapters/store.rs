//! JSON address book file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::{AddrBookSnapshot, PersistenceError};
use crate::ports::AddrBookStore;

/// Address book stored as one JSON document.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-save leaves the previous book intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "addrbook.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl AddrBookStore for JsonFileStore {
    fn load(&self) -> Result<Option<AddrBookSnapshot>, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| PersistenceError::Format(e.to_string()))
    }

    fn save(&self, snapshot: &AddrBookSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }
        let body = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| PersistenceError::Format(e.to_string()))?;

        let tmp = self.temp_path();
        fs::write(&tmp, body).map_err(|e| self.io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(&self.path, e))
    }
}
