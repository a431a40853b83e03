//! File-backed key/value store shared by pipeline steps
//!
//! One JSON document per pipeline, split into named regions:
//!
//! ```json
//! { "cache": { "build:...": {...} }, "env-vars": { "RELGATE_TAG": "v1.2.3" } }
//! ```
//!
//! Writes replace the whole file through a temporary file in the same
//! directory, so readers never see a half-written document.

use crate::ci::CiEnvironment;
use crate::config::CacheConfig;
use crate::error::{RelgateError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const CACHE_REGION: &str = "cache";
pub const ENV_VARS_REGION: &str = "env-vars";
pub const RESULTS_REGION: &str = "results";

type Document = BTreeMap<String, BTreeMap<String, Value>>;

/// Handle on the store file; the file is opened per operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvStore {
    path: PathBuf,
}

impl KvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        KvStore { path: path.into() }
    }

    /// Store file under the cache-directory override, else the configured relative file
    pub fn locate(config: &CacheConfig, env: &CiEnvironment) -> Self {
        let path = match env.get(&config.dir_env) {
            Some(dir) => Path::new(dir).join(&config.file),
            None => PathBuf::from(&config.file),
        };
        KvStore::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `value` under `name`, replacing any previous value
    pub fn save<T: Serialize + ?Sized>(&self, region: &str, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| RelgateError::cache_io(format!("cannot encode '{}': {}", name, e)))?;

        let mut doc = self.read_document()?;
        doc.entry(region.to_string())
            .or_default()
            .insert(name.to_string(), value);

        debug!(region, name, path = %self.path.display(), "saving to store");
        self.write_document(&doc)
    }

    /// Value stored under `name`; `None` when absent
    pub fn load<T: DeserializeOwned>(&self, region: &str, name: &str) -> Result<Option<T>> {
        let doc = self.read_document()?;
        let Some(value) = doc.get(region).and_then(|r| r.get(name)) else {
            return Ok(None);
        };

        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| RelgateError::cache_io(format!("cannot decode '{}': {}", name, e)))
    }

    /// Every entry of a region, decoded as `T`
    pub fn load_all<T: DeserializeOwned>(&self, region: &str) -> Result<BTreeMap<String, T>> {
        let mut doc = self.read_document()?;
        let entries = doc.remove(region).unwrap_or_default();

        entries
            .into_iter()
            .map(|(name, value)| {
                let decoded = serde_json::from_value(value).map_err(|e| {
                    RelgateError::cache_io(format!("cannot decode '{}': {}", name, e))
                })?;
                Ok((name, decoded))
            })
            .collect()
    }

    /// Drop `name` from a region; true if it was present
    pub fn remove(&self, region: &str, name: &str) -> Result<bool> {
        let mut doc = self.read_document()?;
        let removed = doc
            .get_mut(region)
            .map(|r| r.remove(name).is_some())
            .unwrap_or(false);
        if removed {
            self.write_document(&doc)?;
        }
        Ok(removed)
    }

    /// Parse error of an existing store file, if any
    ///
    /// A file that cannot be read at all is an error, not corruption.
    pub fn corruption(&self) -> Result<Option<String>> {
        let Some(content) = self.read_content()? else {
            return Ok(None);
        };
        Ok(serde_json::from_str::<Document>(&content)
            .err()
            .map(|e| e.to_string()))
    }

    /// Delete the whole store file
    pub fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error("remove", e)),
        }
    }

    /// File contents; `None` when missing or blank
    fn read_content(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("read", e)),
        }
    }

    fn read_document(&self) -> Result<Document> {
        let Some(content) = self.read_content()? else {
            return Ok(Document::new());
        };

        serde_json::from_str(&content).map_err(|e| {
            RelgateError::cache_io(format!("corrupt store '{}': {}", self.path.display(), e))
        })
    }

    fn write_document(&self, doc: &Document) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error("create directory for", e))?;

        let body = serde_json::to_vec_pretty(doc)
            .map_err(|e| RelgateError::cache_io(format!("cannot encode store: {}", e)))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.io_error("write", e))?;
        tmp.write_all(&body).map_err(|e| self.io_error("write", e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error("replace", e.error))?;
        Ok(())
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> RelgateError {
        RelgateError::cache_io(format!("cannot {} '{}': {}", action, self.path.display(), e))
    }
}
