//! Stable actor identity persisted across launches

use log::{info, warn};
use serde_json::{Map, Value};
use shared::paths;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const IDENTITY_KEY: &str = "arenaPlayerId";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("identity file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// An id must be a single non-blank path segment.
fn is_usable(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains('/') && paths::is_valid(&paths::player(id))
}

pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.arena_sync/identity.json`, or the working directory if no home
    /// directory is set.
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".arena_sync")
            .join("identity.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored id, creating and saving a fresh one if the file is
    /// missing, unreadable as JSON, or lacks a usable id. Other keys in the
    /// file are preserved.
    pub fn load_or_create(&self) -> Result<String, IdentityError> {
        let mut document = match self.read() {
            Ok(Some(document)) => document,
            Ok(None) => Map::new(),
            Err(IdentityError::Json(e)) => {
                warn!("Identity file {} is corrupt ({}), regenerating", self.path.display(), e);
                Map::new()
            }
            Err(e) => return Err(e),
        };

        if let Some(Value::String(id)) = document.get(IDENTITY_KEY) {
            if is_usable(id) {
                return Ok(id.clone());
            }
            warn!("Stored identity {:?} cannot name a store path, regenerating", id);
        }

        let id = generate_id();
        document.insert(IDENTITY_KEY.to_string(), Value::String(id.clone()));
        self.write(&document)?;
        info!("Created new identity {} in {}", id, self.path.display());
        Ok(id)
    }

    fn read(&self) -> Result<Option<Map<String, Value>>, IdentityError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Ok(None),
        }
    }

    fn write(&self, document: &Map<String, Value>) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(document)?)?;
        Ok(())
    }
}
