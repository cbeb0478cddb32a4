//! Configuration loader: merges environment variables with an optional `.env` file.
//!
//! Variables already present in the environment take precedence over `.env`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::cache::RedisSettings;
use crate::data::weather::DEFAULT_API_URL;

pub const ENV_REDIS_ADDRESS: &str = "REDIS_ADDRESS";
pub const ENV_REDIS_PASS: &str = "REDIS_PASS";
pub const ENV_REDIS_DB: &str = "REDIS_DB";
pub const ENV_REDIS_EXPIRY_MIN: &str = "REDIS_EXPIRY_MIN";
pub const ENV_CONTEXT_TIMEOUT_SEC: &str = "CONTEXT_TIMEOUT_SEC";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_API_URL: &str = "API_URL";
pub const ENV_CACHE_BACKEND: &str = "CACHE_BACKEND";

const DEFAULT_EXPIRY_MIN: u64 = 30;
const DEFAULT_TIMEOUT_SEC: u64 = 10;
/// One year
const MAX_EXPIRY_MIN: u64 = 525_600;
/// One hour
const MAX_TIMEOUT_SEC: u64 = 3_600;
const API_KEY_PLACEHOLDER: &str = "your_weather_api_key_here";

/// Errors produced while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more settings are missing or malformed
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// A cache backend name that is not redis, disk or none
    #[error("unknown cache backend '{0}' (expected redis, disk or none)")]
    UnknownBackend(String),
}

/// Which cache store to put in front of the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    #[default]
    Redis,
    Disk,
    None,
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "disk" | "file" => Ok(Self::Disk),
            "none" | "off" => Ok(Self::None),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl CacheBackend {
    /// Store name as reported by health, `None` for [`CacheBackend::None`]
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Redis => Some("redis"),
            Self::Disk => Some("disk"),
            Self::None => None,
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Disk => write!(f, "disk"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub redis: RedisSettings,
    /// TTL for cached records, in minutes
    pub cache_expiry_min: u64,
    /// Per-lookup deadline and Redis startup probe timeout, in seconds
    pub request_timeout_sec: u64,
    pub api_key: String,
    /// Provider endpoint; `https://` is assumed when no scheme is given
    pub api_url: String,
    pub cache_backend: CacheBackend,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis", &self.redis)
            .field("cache_expiry_min", &self.cache_expiry_min)
            .field("request_timeout_sec", &self.request_timeout_sec)
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("cache_backend", &self.cache_backend)
            .finish()
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn load() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            debug!("No .env file found, using environment variables");
        }
        Self::from_env()
    }

    /// Read configuration from the process environment only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    ///
    /// Every problem is collected so the user sees all of them at once.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut issues: Vec<String> = Vec::new();
        let var = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        let redis = RedisSettings {
            address: var(ENV_REDIS_ADDRESS).unwrap_or_else(|| RedisSettings::default().address),
            password: get(ENV_REDIS_PASS).unwrap_or_default(),
            db: var(ENV_REDIS_DB)
                .map(|raw| parse_non_negative_i64(&raw, ENV_REDIS_DB))
                .transpose()
                .unwrap_or_else(|issue| {
                    issues.push(issue);
                    None
                })
                .unwrap_or(0),
        };

        let cache_expiry_min = var(ENV_REDIS_EXPIRY_MIN)
            .map(|raw| parse_bounded_u64(&raw, ENV_REDIS_EXPIRY_MIN, MAX_EXPIRY_MIN))
            .transpose()
            .unwrap_or_else(|issue| {
                issues.push(issue);
                None
            })
            .unwrap_or(DEFAULT_EXPIRY_MIN);

        let request_timeout_sec = var(ENV_CONTEXT_TIMEOUT_SEC)
            .map(|raw| parse_bounded_u64(&raw, ENV_CONTEXT_TIMEOUT_SEC, MAX_TIMEOUT_SEC))
            .transpose()
            .unwrap_or_else(|issue| {
                issues.push(issue);
                None
            })
            .unwrap_or(DEFAULT_TIMEOUT_SEC);

        let cache_backend = match var(ENV_CACHE_BACKEND) {
            Some(raw) => raw.parse::<CacheBackend>().unwrap_or_else(|err| {
                issues.push(err.to_string());
                CacheBackend::default()
            }),
            None => CacheBackend::default(),
        };

        let config = Config {
            redis,
            cache_expiry_min,
            request_timeout_sec,
            api_key: var(ENV_API_KEY).unwrap_or_default(),
            api_url: var(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            cache_backend,
        };

        issues.extend(validate_config(&config));
        if issues.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_min.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }
}

fn parse_bounded_u64(raw: &str, env_name: &str, max: u64) -> Result<u64, String> {
    match raw.trim().parse::<u64>() {
        Ok(value) if (1..=max).contains(&value) => Ok(value),
        _ => Err(format!("{env_name} must be an integer between 1 and {max}")),
    }
}

fn parse_non_negative_i64(raw: &str, env_name: &str) -> Result<i64, String> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value),
        _ => Err(format!("{env_name} must be an integer >= 0")),
    }
}

fn validate_config(config: &Config) -> Vec<String> {
    let mut issues = Vec::new();

    let api_key = config.api_key.trim();
    if api_key.is_empty() || api_key == API_KEY_PLACEHOLDER {
        issues.push(format!(
            "{ENV_API_KEY} is required (get a free key from https://www.weatherapi.com/signup.aspx)"
        ));
    }
    if config.api_url.trim().is_empty() {
        issues.push(format!("{ENV_API_URL} must not be empty"));
    }
    if config.cache_backend == CacheBackend::Redis && config.redis.address.trim().is_empty() {
        issues.push(format!("{ENV_REDIS_ADDRESS} must not be empty"));
    }

    issues
}
