use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use std::sync::Arc;
use tracing::debug;
use weather_core::{
    AppController, Config, Coordinates, FileStore, FixedPosition, OpenWeatherClient, Preferences,
    Units, provider_from_config,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store your OpenWeather API key and preferred units.
    Configure,

    /// Show current weather and a 5-day forecast for a city.
    Show {
        /// City name; defaults to the last city you looked up.
        city: Option<String>,

        /// Switch units before looking up ("metric" or "imperial"); remembered.
        #[arg(long)]
        units: Option<Units>,
    },

    /// Show weather at a position.
    Locate {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(long)]
        units: Option<Units>,
    },

    /// Switch units (toggles when none given) and reload the last city.
    Units {
        units: Option<Units>,
    },

    /// Suggest city names matching a prefix.
    Suggest {
        prefix: String,

        #[arg(long, default_value_t = 5)]
        limit: u8,
    },

    /// List (or clear) recently searched cities.
    Recent {
        #[arg(long)]
        clear: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;
        debug!(command = ?self.command, api_key_set = config.has_api_key(), "running");

        match self.command {
            Command::Configure => configure(config),
            Command::Show { city, units } => {
                if let Some(units) = units {
                    preferences()?.set_units(units)?;
                }
                let controller = controller(&config)?;
                match city {
                    Some(city) => controller.search(&city).await,
                    None => controller.refresh().await,
                }
                report(&controller)
            }
            Command::Units { units } => {
                let controller = controller(&config)?;
                let units = units.unwrap_or_else(|| controller.units().toggled());
                controller.set_units(units).await;
                report(&controller)
            }
            Command::Locate { lat, lon, units } => {
                if let Some(units) = units {
                    preferences()?.set_units(units)?;
                }
                let controller = controller(&config)?;
                controller.locate(&FixedPosition(Coordinates { lat, lon })).await;
                report(&controller)
            }
            Command::Suggest { prefix, limit } => {
                let controller = controller(&config)?;
                let suggestions = controller.suggest(&prefix, limit).await?;
                print!("{}", output::render_suggestions(&suggestions));
                Ok(())
            }
            Command::Recent { clear } => {
                let controller = offline_controller(&config, preferences()?)?;
                if clear {
                    controller.clear_recent();
                    println!("Recent searches cleared.");
                } else {
                    print!("{}", output::render_recent(&controller.state().recent));
                }
                Ok(())
            }
        }
    }
}

fn preferences() -> anyhow::Result<Preferences> {
    let store = FileStore::open_default().context("Failed to open preferences")?;
    Ok(Preferences::new(Arc::new(store)))
}

fn controller(config: &Config) -> anyhow::Result<AppController> {
    let provider = provider_from_config(config).map_err(|e| {
        anyhow!("{e}.\nHint: run `weather configure` or set OPENWEATHER_API_KEY.")
    })?;
    Ok(AppController::new(provider, preferences()?))
}

/// A controller for commands that only touch saved state, so no API key is needed.
fn offline_controller(config: &Config, prefs: Preferences) -> anyhow::Result<AppController> {
    let provider = OpenWeatherClient::from_config(config)?;
    Ok(AppController::new(Arc::new(provider), prefs))
}

/// Print the controller's state; a lookup error becomes the exit error.
fn report(controller: &AppController) -> anyhow::Result<()> {
    let state = controller.state();
    print!("{}", output::render_state(&state));

    match state.error_message {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Get one at https://home.openweathermap.org/api_keys")
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }

    let prefs = preferences()?;
    let options = vec![Units::Imperial, Units::Metric];
    let start = options.iter().position(|u| *u == prefs.units()).unwrap_or(0);
    let units = Select::new("Units:", options)
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read units")?;

    config.set_api_key(api_key);
    config.save()?;
    prefs.set_units(units)?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_core::RecentSearches;

    #[test]
    fn recent_clear_works_without_api_key() {
        let prefs = Preferences::in_memory();
        let mut recent = RecentSearches::new();
        recent.remember("Reno");
        prefs.set_recent(&recent).expect("seed");

        let controller = offline_controller(&Config::default(), prefs.clone()).expect("controller");
        assert_eq!(controller.state().recent.as_slice(), ["Reno"]);

        controller.clear_recent();
        assert!(prefs.recent().is_empty());
        assert_eq!(output::render_recent(&controller.state().recent), "No recent searches.\n");
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["weather", "locate", "--lat", "-33.9", "--lon", "18.4"])
            .expect("parse");
        assert!(matches!(cli.command, Command::Locate { lat, .. } if lat == -33.9));
    }
}
