//! File-backed cache store
//!
//! Persists each entry as a JSON file with an expiry timestamp so a one-shot
//! CLI run can reuse results from earlier runs without a Redis server.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::{CacheError, CacheStore};

/// Distinguishes temp files of concurrent writes within one process
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    /// The cached value, as the UTF-8 text it was handed in as
    value: String,
    /// When the value was cached
    cached_at: DateTime<Utc>,
    /// When the cache entry expires
    expires_at: DateTime<Utc>,
}

/// Stores cache entries as JSON files in a directory
///
/// The default location is XDG-compliant (`~/.cache/weathercache/` on Linux).
/// Expired entries read as absent and are removed on the next read.
#[derive(Debug, Clone)]
pub struct DiskStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl DiskStore {
    /// Creates a DiskStore using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "weathercache")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a DiskStore rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the file backing `key`
    ///
    /// Keys are hex-encoded so arbitrary city strings map to distinct, portable
    /// file names.
    fn entry_path(&self, key: &str) -> PathBuf {
        let name: String = key.bytes().map(|b| format!("{:02x}", b)).collect();
        self.cache_dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let entry: DiskEntry =
            serde_json::from_str(&content).map_err(|e| CacheError::Encoding(e.to_string()))?;

        if Utc::now() > entry.expires_at {
            debug!(key, expired_at = %entry.expires_at, "Disk cache entry expired");
            // Best effort; a leftover file is ignored on the next read anyway.
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(entry.value.into_bytes()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).await?;

        let value = String::from_utf8(value.to_vec())
            .map_err(|e| CacheError::Encoding(e.to_string()))?;
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| CacheError::Encoding(e.to_string()))?;

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| CacheError::Encoding("cache TTL out of range".to_string()))?;
        let entry = DiskEntry {
            value,
            cached_at: now,
            expires_at,
        };

        let json =
            serde_json::to_string_pretty(&entry).map_err(|e| CacheError::Encoding(e.to_string()))?;

        // Readers see either the old file or the new one, never a partial write
        let path = self.entry_path(key);
        let tmp_path = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            WRITE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp_path, json).await?;
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).await?;
        let metadata = fs::metadata(&self.cache_dir).await?;
        if metadata.permissions().readonly() {
            return Err(CacheError::Unavailable(format!(
                "{} is read-only",
                self.cache_dir.display()
            )));
        }
        Ok(())
    }
}
