//! Command-line interface parsing for weathercache
//!
//! This module handles parsing of CLI arguments using clap and validates the
//! city argument before any lookup is attempted.

use clap::{Parser, Subcommand};
use thiserror::Error;

/// Error types for CLI argument validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// The city argument was empty or only whitespace
    #[error("Please provide a city name")]
    EmptyCity,
}

/// weathercache - current weather behind a cache-aside Redis or disk cache
#[derive(Parser, Debug)]
#[command(name = "weathercache")]
#[command(about = "Current weather for a city, cached in Redis or on disk")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Skip the cache and always call the weather API
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Print JSON instead of a text card
    #[arg(long, global = true)]
    pub json: bool,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Look up current weather for a city
    ///
    /// Examples:
    ///   weathercache lookup London
    ///   weathercache lookup "New York" --json
    Lookup {
        /// City name, passed to the provider and used verbatim as the cache key
        city: String,
    },
    /// Report whether the cache is reachable
    Health,
}

/// Checks that a city argument is usable.
///
/// The city is returned unchanged: surrounding whitespace and case are kept so
/// the cache key matches exactly what was asked for.
///
/// # Returns
/// * `Ok(&str)` if the city contains at least one non-whitespace character
/// * `Err(CliError::EmptyCity)` otherwise
pub fn validate_city(city: &str) -> Result<&str, CliError> {
    if city.trim().is_empty() {
        Err(CliError::EmptyCity)
    } else {
        Ok(city)
    }
}
