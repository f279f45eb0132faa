//! Persisted credential storage.
//!
//! Aliases and cached session tokens live in a flat key/value JSON file.
//! The store is passed into `Session` explicitly so independent sessions
//! share the cache without any global state.

use crate::error::{Error, Result};
use crate::paths;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which an alias address is stored.
pub fn alias_key(name: &str) -> String {
    format!("alias.{}", name)
}

/// Key under which a session token is stored, scoped per `user@address`.
pub fn session_key(user: &str, url: &str) -> String {
    format!("session.{}@{}", user, url)
}

pub trait CredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// File-backed store: a single JSON object read once at construction and
/// written through on every set.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::internal_io(e.to_string(), Some(path.display().to_string()))
            })?;
            serde_json::from_str(&content)
                .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Open the store at its default location (~/.config/flowctl/credentials.json).
    pub fn open_default() -> Result<Self> {
        Self::open(&paths::credentials_json()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::internal_io(e.to_string(), Some(parent.display().to_string()))
            })?;
        }
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize store".into())))?;
        fs::write(&self.path, content)
            .map_err(|e| Error::internal_io(e.to_string(), Some(self.path.display().to_string())))
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}

/// In-memory store, used by tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(values: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
