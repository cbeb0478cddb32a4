//! Core data models for weathercache
//!
//! The record shape mirrors the upstream current-conditions payload so that the
//! same serde derive decodes the API response and the cached copy.

pub mod weather;

pub use weather::{WeatherClient, WeatherError, WeatherSource};

use serde::{Deserialize, Serialize};

/// Snapshot of current weather for a single location
///
/// Values are produced by decoding either an upstream response or a cache
/// entry and are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Where the observation was taken
    pub location: Location,
    /// Current conditions at that location
    pub current: Current,
}

/// Location block of a weather record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// City or place name as resolved by the provider
    pub name: String,
    /// Region, state or province
    pub region: String,
    /// Country name
    pub country: String,
    /// Latitude coordinate
    pub lat: f64,
    /// Longitude coordinate
    pub lon: f64,
    /// Local time at the location, as reported by the provider (e.g. "2024-07-15 14:00")
    pub localtime: String,
}

/// Current conditions block of a weather record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Current {
    /// Temperature in Celsius
    pub temp_c: f64,
    /// Temperature in Fahrenheit
    pub temp_f: f64,
    /// Condition text and icon
    pub condition: Condition,
    /// Wind speed in km/h
    pub wind_kph: f64,
    /// Compass wind direction (e.g. "WSW")
    pub wind_dir: String,
    /// Relative humidity percentage (0-100)
    pub humidity: i32,
    /// Cloud cover percentage (0-100)
    pub cloud: i32,
    /// Feels-like temperature in Celsius
    pub feelslike_c: f64,
    /// UV index
    pub uv: f64,
}

/// Human-readable condition with the provider's icon URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: String,
}
