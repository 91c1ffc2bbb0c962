//! Filesystem-backed store for local development and single-host deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memo_core::{Error, KeyValueStore, Payload, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// On-disk envelope for one entry.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    payload: Payload,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

/// One file per key under a root directory.
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Sanitized key plus a short digest, so distinct keys never share a file.
    fn key_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .take(64)
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        let digest = Sha256::digest(key.as_bytes());
        self.root_dir
            .join(format!("{}-{}.json", sanitized, hex::encode(&digest[..8])))
    }
}

impl Default for FilesystemStore {
    fn default() -> Self {
        let root = directories::ProjectDirs::from("", "", "memo-cache")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("memo-cache"));
        Self::new(root)
    }
}

/// Write through a uniquely named temp file, then rename over `path`.
///
/// Readers never see a partial file, and concurrent writers of one key each
/// rename their own temp file, so the last rename wins.
fn write_atomic(root_dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(root_dir)
        .map_err(|e| Error::Backend(format!("Failed to write cache: {}", e)))?;
    tmp.write_all(contents)
        .map_err(|e| Error::Backend(format!("Failed to write cache: {}", e)))?;
    tmp.persist(path)
        .map_err(|e| Error::Backend(format!("Failed to write cache: {}", e.error)))?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FilesystemStore {
    async fn get(&self, key: &str) -> Result<Option<Payload>> {
        let path = self.key_path(key);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Backend(format!("Failed to read cache: {}", e))),
        };

        let envelope: Envelope = serde_json::from_slice(&contents)
            .map_err(|e| Error::Backend(format!("Corrupt cache file {}: {}", path.display(), e)))?;

        if envelope.expires_at.is_some_and(|at| Utc::now() >= at) {
            debug!(key = %key, "Removing expired cache file");
            self.delete(key).await?;
            return Ok(None);
        }

        Ok(Some(envelope.payload))
    }

    async fn set(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| Error::Backend(format!("Failed to create cache dir: {}", e)))?;

        let created_at = Utc::now();
        // A TTL past the calendar's range never expires.
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| created_at.checked_add_signed(ttl));
        let envelope = Envelope {
            key: key.to_string(),
            payload: value,
            created_at,
            expires_at,
        };
        let contents = serde_json::to_vec(&envelope)
            .map_err(|e| Error::Backend(format!("Failed to serialize entry: {}", e)))?;

        let path = self.key_path(key);
        let root_dir = self.root_dir.clone();
        tokio::task::spawn_blocking(move || write_atomic(&root_dir, &path, &contents))
            .await
            .map_err(|e| Error::Internal(format!("Cache write task failed: {}", e)))?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Backend(format!("Failed to delete cache: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
