//! Object store boundary for templates and generated artifacts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors returned by an object store.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The key does not resolve to an object.
    #[error("object not found: {0}")]
    NotFound(String),
    /// The key is not acceptable for this store.
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Listing entry for one stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    /// Key relative to the store root, `/`-separated.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

/// Minimal read/write/list interface over a blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under a key, replacing any previous content.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;
    /// Fetch an object's content.
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
    /// List objects under a key prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, ObjectStoreError>;
    /// Produce a time-limited signed link for a stored object.
    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError>;
}

/// Filesystem-backed object store.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ObjectStoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized object store (root={})", root.display());
        Ok(Self { root })
    }

    /// Resolve a key into a path under the root, rejecting escapes.
    fn resolve(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "..")
        {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("storing object (key={}, bytes={})", key, bytes.len());
        fs::write(path, bytes)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.resolve(key)?;
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, ObjectStoreError> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !key.starts_with(prefix) {
                continue;
            }
            let metadata = entry.metadata().map_err(|err| {
                ObjectStoreError::Io(std::io::Error::other(err.to_string()))
            })?;
            let last_modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.push(ObjectInfo {
                key,
                size: metadata.len(),
                last_modified,
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError> {
        let path = self.resolve(key)?;
        let expires = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        Ok(format!(
            "file://{}?expires={}",
            path.display(),
            expires.timestamp()
        ))
    }
}
