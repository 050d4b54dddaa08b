//! Persistent run state for incremental updates.
//!
//! A single JSON file maps every relevant file path to the SHA-256 of its
//! content, next to the timestamp of the last successful run. The file is
//! written atomically (temp file, then rename) and only after the loader
//! reports success, so a failed run leaves the previous state intact.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// On-disk shape of the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerState {
    /// ISO-8601 time of the last committed run, or null before the first.
    pub last_update: Option<String>,
    /// Absolute file path to hex SHA-256 of its content.
    pub files: BTreeMap<String, String>,
    /// Opaque per-module metadata, kept across runs.
    pub modules: BTreeMap<String, serde_json::Value>,
}

/// Owner of the state file.
pub struct StateStore {
    path: PathBuf,
    state: AnalyzerState,
}

impl StateStore {
    /// Open the store, loading existing state when present. A corrupt file
    /// is logged and replaced with a fresh state on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(state) => state,
                Err(err) => {
                    warn!(path = %path.display(), %err, "corrupt state file; starting fresh");
                    AnalyzerState::default()
                }
            },
            Err(_) => AnalyzerState::default(),
        };
        Self { path, state }
    }

    pub fn last_update(&self) -> Option<&str> {
        self.state.last_update.as_deref()
    }

    /// Stamp `last_update` and persist atomically.
    pub fn save(&mut self) -> CoreResult<()> {
        self.state.last_update = Some(chrono::Utc::now().to_rfc3339());
        self.write_file()
    }

    fn write_file(&self) -> CoreResult<()> {
        let state_write = |source| CoreError::StateWrite {
            path: self.path.clone(),
            source,
        };

        let dir = self.path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(state_write)?;

        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(state_write)?;
        serde_json::to_writer_pretty(&tmp, &self.state)
            .map_err(|err| state_write(err.into()))?;
        tmp.persist(&self.path).map_err(|err| state_write(err.error))?;
        Ok(())
    }

    /// Streamed SHA-256 of a file, hex encoded. Unreadable files yield
    /// `None` with a warning.
    pub fn file_hash(path: &Path) -> Option<String> {
        let mut file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot hash file");
                return None;
            }
        };

        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(err) => {
                    warn!(path = %path.display(), %err, "cannot hash file");
                    return None;
                }
            }
        }
        Some(hex::encode(hasher.finalize()))
    }

    /// True when the file's content differs from the stored hash. A file
    /// never seen before counts as changed; an unreadable one does not.
    pub fn has_changed(&self, path: &Path) -> bool {
        let Some(current) = Self::file_hash(path) else {
            return false;
        };
        self.state.files.get(&file_key(path)) != Some(&current)
    }

    /// Re-hash and store a set of processed files.
    pub fn record_files<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) {
        for path in paths {
            if let Some(hash) = Self::file_hash(path) {
                self.state.files.insert(file_key(path), hash);
            }
        }
    }

    pub fn module_state(&self, name: &str) -> Option<&serde_json::Value> {
        self.state.modules.get(name)
    }

    pub fn set_module_state(&mut self, name: &str, value: serde_json::Value) {
        self.state.modules.insert(name.to_string(), value);
    }

    /// Drop all state and remove the file.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.state = AnalyzerState::default();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoreError::StateWrite {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn file_key(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
