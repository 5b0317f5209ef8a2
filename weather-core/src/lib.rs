//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & preference persistence
//! - OpenWeather request construction, caching, deduplication and retry
//! - Forecast collapsing into one entry per day
//! - The application state controller driven by the CLI
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod forecast;
pub mod model;
pub mod prefs;
pub mod provider;
pub mod recent;
pub mod request;
pub mod transport;

pub use cache::{CachePolicy, ResponseCache};
pub use config::{CacheConfig, Config};
pub use controller::{AppController, AppState, Coordinates, FixedPosition, Geolocator, LoadOutcome};
pub use error::{GeolocationError, WeatherError};
pub use model::{CitySuggestion, CurrentWeather, Forecast, ForecastDay, LocationSpec, Units, WeatherQuery};
pub use prefs::{FileStore, MemoryStore, PreferenceStore, Preferences};
pub use provider::{WeatherProvider, openweather::OpenWeatherClient, provider_from_config};
pub use recent::RecentSearches;
