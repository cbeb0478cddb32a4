//! Cache stores for weather records
//!
//! A [`CacheStore`] is a byte-oriented key-value store with per-entry expiry.
//! Callers treat every error as "cache not available": a failed read is a
//! miss and a failed write is dropped. Two stores ship with the crate, Redis
//! for shared deployments and a JSON-file store for single-user CLI runs.

mod disk;
mod redis_store;

pub use disk::DiskStore;
pub use redis_store::{RedisSettings, RedisStore};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Namespace tag prepended to every weather cache key
pub const CACHE_KEY_PREFIX: &str = "weather:";

/// Cache key for a city query
///
/// The query is used verbatim: no trimming and no case folding, so "London"
/// and "london" are separate entries.
pub fn cache_key(city: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, city)
}

/// Errors raised by a cache store. Never surfaced past the lookup service.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store has no usable connection
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A Redis command failed
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Reading or writing a cache file failed
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be encoded or decoded
    #[error("cache entry encoding error: {0}")]
    Encoding(String),

    /// The operation did not finish before the deadline
    #[error("cache operation timed out")]
    Timeout,
}

/// Key-value store with expiry, shared between concurrent lookups
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs ("redis", "disk", ...)
    fn name(&self) -> &'static str;

    /// Return the raw bytes stored under `key`, or `None` on a miss or expiry
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key` for `ttl`, replacing any existing entry
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Cheap connectivity check used by health reporting
    async fn ping(&self) -> Result<(), CacheError>;
}
