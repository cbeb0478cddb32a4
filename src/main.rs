//! weathercache - current weather for a city behind a cache-aside cache
//!
//! Reads configuration from the environment (and `.env`), checks Redis or the
//! disk cache first and only calls the weather API on a miss.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use weathercache::app::App;
use weathercache::cli::{validate_city, Cli, Command};
use weathercache::config::Config;
use weathercache::logging::init_logging;
use weathercache::render::{render_health, render_weather};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Reject bad input before touching configuration or the network
    if let Command::Lookup { city } = &cli.command {
        validate_city(city)?;
    }

    let config = Config::load()?;
    let app = App::build(config, cli.no_cache).await;

    match &cli.command {
        Command::Lookup { city } => {
            info!(city = %city, "Weather request");

            let record = match app.service.lookup(city).await {
                Ok(record) => record,
                Err(err) => {
                    error!(city = %city, error = %err, "Failed to fetch weather");
                    return Err(err.into());
                }
            };

            info!(
                city = %record.location.name,
                temp = record.current.temp_c,
                "Weather data retrieved"
            );

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{}", render_weather(&record));
            }
        }
        Command::Health => {
            let report = app.service.health().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render_health(&report));
            }
        }
    }

    Ok(())
}
