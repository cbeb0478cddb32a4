//! Upstream weather API client
//!
//! Issues a single current-conditions GET against the configured provider and
//! decodes the JSON body into a [`WeatherRecord`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use super::WeatherRecord;

/// Default provider endpoint, without scheme
pub const DEFAULT_API_URL: &str = "api.weatherapi.com/v1/current.json";

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The request never got a response (DNS, connect, TLS, body read)
    #[error("failed to fetch weather data: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with something other than 200 OK
    #[error("weather API returned status code: {0}")]
    Status(u16),

    /// The body did not match the expected schema
    #[error("failed to parse weather data: {0}")]
    Decode(#[from] serde_json::Error),

    /// The lookup deadline elapsed before the provider answered
    #[error("weather lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl WeatherError {
    /// HTTP status returned by the provider, if that is what failed
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Source of truth for weather records
///
/// Implemented by [`WeatherClient`]; tests substitute their own source to count
/// calls or inject failures.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch current weather for `city`. Exactly one upstream call, no retries.
    async fn fetch(&self, city: &str) -> Result<WeatherRecord, WeatherError>;
}

/// Client for fetching current weather from the provider
#[derive(Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for WeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl WeatherClient {
    /// Create a new WeatherClient with a default HTTP client
    ///
    /// `base_url` may omit the scheme (`api.weatherapi.com/v1/current.json`), in
    /// which case `https://` is assumed.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    /// Create a new WeatherClient with a custom HTTP client
    pub fn with_client(client: Client, base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
            api_key: api_key.into(),
        }
    }

    /// The fully-qualified endpoint requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch current conditions for `city`
    ///
    /// # Returns
    /// * `Ok(WeatherRecord)` - Decoded current weather
    /// * `Err(WeatherError::Status)` - Provider answered with a non-200 status
    /// * `Err(WeatherError::Decode)` - Body did not match the record schema
    /// * `Err(WeatherError::Transport)` - The request itself failed
    pub async fn fetch_current(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        debug!(city, url = %self.base_url, "Fetching from API");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str()), ("q", city), ("aqi", "no")])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        parse_response(&text)
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        self.fetch_current(city).await
    }
}

/// Prefix `https://` unless the URL already carries a scheme
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Parse a provider response body into a WeatherRecord
fn parse_response(body: &str) -> Result<WeatherRecord, WeatherError> {
    Ok(serde_json::from_str(body)?)
}
