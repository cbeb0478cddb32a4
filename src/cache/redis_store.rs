//! Redis-backed cache store

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};

use super::{CacheError, CacheStore};

/// Where and how to reach Redis
#[derive(Clone, PartialEq, Eq)]
pub struct RedisSettings {
    /// `host:port`, or a full `redis://` URL
    pub address: String,
    /// Empty when the server has no auth
    pub password: String,
    pub db: i64,
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("address", &self.address)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("db", &self.db)
            .finish()
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            address: "localhost:6379".to_string(),
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisSettings {
    /// Connection URL understood by `redis::Client::open`
    pub fn connection_url(&self) -> String {
        if self.address.contains("://") {
            return self.address.clone();
        }
        if self.password.is_empty() {
            format!("redis://{}/{}", self.address, self.db)
        } else {
            format!(
                "redis://:{}@{}/{}",
                urlencoding::encode(&self.password),
                self.address,
                self.db
            )
        }
    }
}

/// Cache store on a shared Redis connection
///
/// `ConnectionManager` multiplexes commands over one connection and reconnects
/// on its own, so clones are cheap and safe to use from concurrent lookups.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    address: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect and probe once, or run without a cache
    ///
    /// A failed or slow probe is logged and yields `None`; startup never fails
    /// because Redis is down.
    pub async fn connect(settings: &RedisSettings, probe_timeout: Duration) -> Option<Self> {
        match Self::try_connect(settings, probe_timeout).await {
            Ok(store) => {
                info!(address = %settings.address, db = settings.db, "Redis connected");
                Some(store)
            }
            Err(err) => {
                warn!(
                    address = %settings.address,
                    error = %err,
                    "Redis connection failed - running without cache"
                );
                None
            }
        }
    }

    /// Connect and `PING` once, bounded by `probe_timeout`
    ///
    /// `ConnectionManager::new` retries a refused first connection with
    /// backoff, so reachability is checked on a plain multiplexed connection
    /// first. The manager is only built once the server has answered.
    pub async fn try_connect(
        settings: &RedisSettings,
        probe_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.connection_url())?;

        let probe = async {
            let mut probe_conn = client.get_multiplexed_async_connection().await?;
            let _pong: String = redis::cmd("PING").query_async(&mut probe_conn).await?;
            ConnectionManager::new(client).await
        };

        let conn = tokio::time::timeout(probe_timeout, probe)
            .await
            .map_err(|_| CacheError::Timeout)??;

        Ok(Self {
            conn,
            address: settings.address.clone(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // EX 0 is rejected by Redis
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
