//! Persisted engine list.
//!
//! The store is a JSON array of named engine records:
//!
//! ```json
//! [
//!   {"id": "…", "name": "narrator", "engine": {"#type": "openai", "voice": "nova", …}}
//! ]
//! ```
//!
//! Records are kept as-is; an engine is only constructed when used, so a
//! record of a type this build does not know stays in the file untouched.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::tts::EngineRecord;

/// Errors of the engine store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access engine store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("An engine named '{0}' already exists")]
    DuplicateName(String),

    #[error("No engine with id or name '{0}'")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One named engine in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEngine {
    pub id: Uuid,
    pub name: String,
    pub engine: EngineRecord,
}

impl StoredEngine {
    fn matches(&self, id_or_name: &str) -> bool {
        self.name == id_or_name || self.id.to_string() == id_or_name
    }
}

/// File-backed engine list.
#[derive(Debug, Clone)]
pub struct EngineStore {
    path: PathBuf,
}

impl EngineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored engine. A missing file is an empty store.
    pub fn load(&self) -> StoreResult<Vec<StoredEngine>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Engine store not found, starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the stored list, writing through a temporary file.
    pub fn save(&self, engines: &[StoredEngine]) -> StoreResult<()> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(engines).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), count = engines.len(), "Engine store saved");
        Ok(())
    }

    /// Looks an engine up by id or name.
    pub fn get(&self, id_or_name: &str) -> StoreResult<StoredEngine> {
        self.load()?
            .into_iter()
            .find(|e| e.matches(id_or_name))
            .ok_or_else(|| StoreError::NotFound(id_or_name.to_string()))
    }

    /// Adds a named engine and returns its entry.
    pub fn add(&self, name: &str, engine: EngineRecord) -> StoreResult<StoredEngine> {
        let mut engines = self.load()?;
        if engines.iter().any(|e| e.name == name) {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        let entry = StoredEngine {
            id: Uuid::new_v4(),
            name: name.to_string(),
            engine,
        };
        engines.push(entry.clone());
        self.save(&engines)?;
        info!(id = %entry.id, name, engine = %entry.engine.type_tag, "Engine added");
        Ok(entry)
    }

    /// Replaces the record of an existing engine.
    pub fn update(&self, id_or_name: &str, engine: EngineRecord) -> StoreResult<StoredEngine> {
        let mut engines = self.load()?;
        let entry = engines
            .iter_mut()
            .find(|e| e.matches(id_or_name))
            .ok_or_else(|| StoreError::NotFound(id_or_name.to_string()))?;
        entry.engine = engine;
        let updated = entry.clone();
        self.save(&engines)?;
        info!(id = %updated.id, name = %updated.name, "Engine updated");
        Ok(updated)
    }

    /// Removes an engine and returns it.
    pub fn remove(&self, id_or_name: &str) -> StoreResult<StoredEngine> {
        let mut engines = self.load()?;
        let index = engines
            .iter()
            .position(|e| e.matches(id_or_name))
            .ok_or_else(|| StoreError::NotFound(id_or_name.to_string()))?;
        let removed = engines.remove(index);
        self.save(&engines)?;
        info!(id = %removed.id, name = %removed.name, "Engine removed");
        Ok(removed)
    }
}
