//! Cache-aside weather lookup
//!
//! [`WeatherService`] checks the cache, falls back to the upstream source on a
//! miss and writes the fresh record back. The cache is strictly best-effort:
//! its presence or absence changes latency and upstream load, never the
//! result. Only upstream failures reach the caller.
//!
//! Absorbed cache failures are reported as [`LookupEvent`]s to an injected
//! [`LookupObserver`] instead of through the return value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

use crate::cache::{cache_key, CacheError, CacheStore};
use crate::data::{WeatherError, WeatherRecord, WeatherSource};

/// Default time-to-live for cached records
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Default budget for a whole lookup (cache read, upstream call, cache write)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Share of the request timeout a single cache call may use unless set explicitly
const CACHE_TIMEOUT_DIVISOR: u32 = 4;

/// Deadline used when `now + timeout` does not fit in an `Instant`
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

/// Diagnostics emitted while serving a lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupEvent {
    /// A valid record was served from cache
    CacheHit { key: String },
    /// The store had nothing under the key
    CacheMiss { key: String },
    /// The store errored or timed out; treated as a miss
    CacheReadFailed { key: String, reason: String },
    /// The store returned bytes that are not a weather record; treated as a miss
    CacheDecodeFailed { key: String, reason: String },
    /// Writing the fresh record back failed; the lookup still succeeds
    CacheWriteFailed { key: String, reason: String },
    /// The fresh record was written back
    Cached { key: String, ttl: Duration },
    /// The upstream call failed and the error was returned to the caller
    UpstreamFailed { city: String, reason: String },
}

/// Receives lookup diagnostics
pub trait LookupObserver: Send + Sync {
    fn observe(&self, event: &LookupEvent);
}

/// Default observer: forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LookupObserver for TracingObserver {
    fn observe(&self, event: &LookupEvent) {
        match event {
            LookupEvent::CacheHit { key } => debug!(key = %key, "Cache hit"),
            LookupEvent::CacheMiss { key } => debug!(key = %key, "Cache miss"),
            LookupEvent::CacheReadFailed { key, reason } => {
                warn!(key = %key, error = %reason, "Failed to read cached weather data")
            }
            LookupEvent::CacheDecodeFailed { key, reason } => {
                warn!(key = %key, error = %reason, "Discarding undecodable cache entry")
            }
            LookupEvent::CacheWriteFailed { key, reason } => {
                warn!(key = %key, error = %reason, "Failed to cache weather data")
            }
            LookupEvent::Cached { key, ttl } => {
                debug!(key = %key, expiry = ?ttl, "Cached weather data")
            }
            LookupEvent::UpstreamFailed { city, reason } => {
                warn!(city = %city, error = %reason, "Weather API request failed")
            }
        }
    }
}

/// Cache connectivity as seen by [`WeatherService::health`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Connected,
    /// A backend is configured but did not answer
    Disconnected,
    /// Running without a cache on purpose
    Disabled,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Snapshot returned by [`WeatherService::health`]
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub cache: CacheStatus,
    /// Configured backend name, `None` when the cache is disabled
    pub cache_backend: Option<&'static str>,
    pub checked_at: DateTime<Utc>,
    pub version: &'static str,
}

/// Cache-aside weather lookup over an optional cache and a weather source
///
/// Cheap to share behind an `Arc`; every field is read-only after
/// construction.
#[derive(Clone)]
pub struct WeatherService {
    source: Arc<dyn WeatherSource>,
    cache: Option<Arc<dyn CacheStore>>,
    /// Backend the deployment asked for, even if it could not be opened
    configured_backend: Option<&'static str>,
    observer: Arc<dyn LookupObserver>,
    cache_ttl: Duration,
    request_timeout: Duration,
    cache_timeout: Option<Duration>,
}

impl fmt::Debug for WeatherService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherService")
            .field("cache", &self.cache.as_ref().map(|c| c.name()))
            .field("cache_ttl", &self.cache_ttl)
            .field("request_timeout", &self.request_timeout)
            .field("cache_timeout", &self.cache_timeout())
            .finish_non_exhaustive()
    }
}

impl WeatherService {
    /// Service with no cache (pass-through mode), default TTL and timeout
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self {
            source,
            cache: None,
            configured_backend: None,
            observer: Arc::new(TracingObserver),
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_timeout: None,
        }
    }

    /// Attach a cache store, or `None` to run without one
    pub fn with_cache(mut self, cache: Option<Arc<dyn CacheStore>>) -> Self {
        if let Some(store) = &cache {
            self.configured_backend = Some(store.name());
        }
        self.cache = cache;
        self
    }

    /// Record that `backend` was configured but could not be opened
    ///
    /// Lookups still run in pass-through mode; health reports the cache as
    /// disconnected rather than disabled.
    pub fn with_unavailable_cache(mut self, backend: &'static str) -> Self {
        self.cache = None;
        self.configured_backend = Some(backend);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Bound each cache read and write separately from the lookup deadline
    ///
    /// Defaults to a quarter of the request timeout, so a stalled cache leaves
    /// the upstream call most of its budget.
    pub fn with_cache_timeout(mut self, cache_timeout: Duration) -> Self {
        self.cache_timeout = Some(cache_timeout);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LookupObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn cache_timeout(&self) -> Duration {
        self.cache_timeout
            .unwrap_or(self.request_timeout / CACHE_TIMEOUT_DIVISOR)
    }

    /// Look up current weather for `city` within the configured request timeout
    ///
    /// `city` must be non-empty; validating that is the caller's job.
    pub async fn lookup(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        let deadline = Instant::now()
            .checked_add(self.request_timeout)
            .unwrap_or_else(far_future);
        self.lookup_until(city, deadline).await
    }

    /// Look up current weather for `city`, giving up at `deadline`
    ///
    /// Every suspension point is bounded by the deadline. Cache calls are
    /// additionally capped at [`cache_timeout`](Self::cache_timeout) each, so a
    /// hung cache costs latency but cannot starve the upstream call. Dropping
    /// the returned future cancels the lookup.
    ///
    /// # Errors
    /// Only upstream failures on a cache miss: transport, non-200 status,
    /// undecodable body, or the deadline elapsing during the upstream call.
    pub async fn lookup_until(
        &self,
        city: &str,
        deadline: Instant,
    ) -> Result<WeatherRecord, WeatherError> {
        let started = Instant::now();
        let key = cache_key(city);

        if let Some(cache) = &self.cache {
            if let Some(record) = self.read_cached(cache.as_ref(), &key, deadline).await {
                return Ok(record);
            }
        }

        let record = match timeout_at(deadline, self.source.fetch(city)).await {
            Ok(Ok(record)) => record,
            Ok(Err(err)) => {
                self.emit(LookupEvent::UpstreamFailed {
                    city: city.to_string(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
            Err(_) => {
                let err = WeatherError::Timeout(deadline.saturating_duration_since(started));
                self.emit(LookupEvent::UpstreamFailed {
                    city: city.to_string(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        if let Some(cache) = &self.cache {
            self.write_cached(cache.as_ref(), &key, &record, deadline)
                .await;
        }

        Ok(record)
    }

    /// Report whether the cache answers a ping
    pub async fn health(&self) -> HealthReport {
        let cache = match &self.cache {
            Some(cache) => match timeout(HEALTH_PROBE_TIMEOUT, cache.ping()).await {
                Ok(Ok(())) => CacheStatus::Connected,
                Ok(Err(err)) => {
                    debug!(backend = cache.name(), error = %err, "Cache ping failed");
                    CacheStatus::Disconnected
                }
                Err(_) => CacheStatus::Disconnected,
            },
            None if self.configured_backend.is_some() => CacheStatus::Disconnected,
            None => CacheStatus::Disabled,
        };

        HealthReport {
            status: "healthy",
            cache,
            cache_backend: self.configured_backend,
            checked_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Cached record under `key`, or `None` for any kind of miss
    async fn read_cached(
        &self,
        cache: &dyn CacheStore,
        key: &str,
        deadline: Instant,
    ) -> Option<WeatherRecord> {
        let bytes = match timeout_at(self.cache_deadline(deadline), cache.get(key)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                self.emit(LookupEvent::CacheMiss {
                    key: key.to_string(),
                });
                return None;
            }
            Ok(Err(err)) => {
                self.emit_read_failed(key, &err);
                return None;
            }
            Err(_) => {
                self.emit_read_failed(key, &CacheError::Timeout);
                return None;
            }
        };

        match serde_json::from_slice::<WeatherRecord>(&bytes) {
            Ok(record) => {
                self.emit(LookupEvent::CacheHit {
                    key: key.to_string(),
                });
                Some(record)
            }
            Err(err) => {
                self.emit(LookupEvent::CacheDecodeFailed {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Store `record` under `key`; failures are reported and swallowed
    async fn write_cached(
        &self,
        cache: &dyn CacheStore,
        key: &str,
        record: &WeatherRecord,
        deadline: Instant,
    ) {
        let data = match serde_json::to_vec(record) {
            Ok(data) => data,
            Err(err) => {
                self.emit(LookupEvent::CacheWriteFailed {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
                return;
            }
        };

        let write = cache.set(key, &data, self.cache_ttl);
        let outcome = match timeout_at(self.cache_deadline(deadline), write).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        };

        match outcome {
            Ok(()) => self.emit(LookupEvent::Cached {
                key: key.to_string(),
                ttl: self.cache_ttl,
            }),
            Err(err) => self.emit(LookupEvent::CacheWriteFailed {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    fn cache_deadline(&self, deadline: Instant) -> Instant {
        Instant::now()
            .checked_add(self.cache_timeout())
            .map_or(deadline, |cap| cap.min(deadline))
    }

    fn emit_read_failed(&self, key: &str, err: &CacheError) {
        self.emit(LookupEvent::CacheReadFailed {
            key: key.to_string(),
            reason: err.to_string(),
        });
    }

    fn emit(&self, event: LookupEvent) {
        self.observer.observe(&event);
    }
}
