//! weathercache library
//!
//! A cache-aside lookup layer in front of a current-weather HTTP API. The
//! [`lookup::WeatherService`] is the entry point; the binary in `main.rs` is a
//! thin CLI over it.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod lookup;
pub mod render;

pub use cache::{cache_key, CacheError, CacheStore};
pub use data::{WeatherClient, WeatherError, WeatherRecord, WeatherSource};
pub use lookup::{LookupEvent, LookupObserver, WeatherService};
