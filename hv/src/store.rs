//! Settings persistence
//!
//! Each object type persists as one versioned JSON blob keyed by a
//! domain-qualified name. There are no partial writes: callers always load
//! the full registry, rebuild it, and save it back. Saves go through a
//! temp file and rename so readers observe either the old blob or the new
//! one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Storage blob format version
pub const STORAGE_VERSION: u32 = 1;

/// Errors from the settings store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error for {key}")]
    Io {
        key: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt settings blob {key}")]
    Serde {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The three persisted object types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsKind {
    Areas,
    Entities,
    Persons,
}

impl SettingsKind {
    /// Domain-qualified storage key
    pub fn key(&self) -> &'static str {
        match self {
            Self::Areas => "homeview.areas",
            Self::Entities => "homeview.entities",
            Self::Persons => "homeview.persons",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    key: String,
    data: T,
}

/// File-backed adapter for the three settings registries
pub struct SettingsStore {
    base_dir: PathBuf,
}

impl SettingsStore {
    /// Create a store rooted at `base_dir` (created on first save)
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Default storage directory under the platform data dir
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("homeview"))
            .unwrap_or_else(|| PathBuf::from(".homeview"))
    }

    fn path(&self, kind: SettingsKind) -> PathBuf {
        self.base_dir.join(format!("{}.json", kind.key()))
    }

    /// Load the full registry for a kind; empty when nothing is persisted
    pub fn load<T: DeserializeOwned + Default>(&self, kind: SettingsKind) -> Result<T, StoreError> {
        let path = self.path(kind);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = kind.key(), "no settings blob, starting empty");
                return Ok(T::default());
            }
            Err(e) => {
                return Err(StoreError::Io {
                    key: kind.key(),
                    source: e,
                });
            }
        };

        let envelope: Envelope<T> = serde_json::from_str(&raw).map_err(|e| StoreError::Serde {
            key: kind.key(),
            source: e,
        })?;
        Ok(envelope.data)
    }

    /// Overwrite the full registry for a kind
    pub fn save<T: Serialize>(&self, kind: SettingsKind, data: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_dir).map_err(|e| StoreError::Io {
            key: kind.key(),
            source: e,
        })?;

        let envelope = Envelope {
            version: STORAGE_VERSION,
            key: kind.key().to_string(),
            data,
        };
        let raw = serde_json::to_string_pretty(&envelope).map_err(|e| StoreError::Serde {
            key: kind.key(),
            source: e,
        })?;

        let path = self.path(kind);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|e| StoreError::Io {
                key: kind.key(),
                source: e,
            })?;

        debug!(key = kind.key(), path = %path.display(), "saved settings blob");
        Ok(())
    }
}
