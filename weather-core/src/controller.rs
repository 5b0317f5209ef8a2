//! Application state and the actions that change it.
//!
//! Each action (search, locate, unit change, refresh) runs the same two-step
//! workflow: fetch current weather, then, only once that has succeeded, the
//! forecast. A forecast failure degrades to "no forecast"; a current-weather
//! failure clears everything and sets the error message.
//!
//! Actions may overlap. Every action takes a new generation number when it
//! starts, and only the most recently started action may write its result.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{debug, info, warn};

use crate::{
    error::{GeolocationError, WeatherError},
    model::{CitySuggestion, CurrentWeather, Forecast, LocationSpec, Units, WeatherQuery},
    prefs::Preferences,
    provider::WeatherProvider,
    recent::RecentSearches,
};

/// Label used when a coordinate lookup returns no city name.
pub const LOCATION_FALLBACK_LABEL: &str = "My Location";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Source of the user's position.
#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// A position known ahead of time, e.g. passed on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl Geolocator for FixedPosition {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub units: Units,
    pub city_label: String,
    pub weather: Option<CurrentWeather>,
    pub forecast: Option<Forecast>,
    pub loading: bool,
    pub error_message: Option<String>,
    pub recent: RecentSearches,
}

/// Result of one current-weather-then-forecast sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Complete { label: String, weather: CurrentWeather, forecast: Forecast },
    /// Current weather arrived but the forecast did not.
    ForecastUnavailable { label: String, weather: CurrentWeather, error: WeatherError },
    Failed(WeatherError),
}

/// Fetch current weather, then the forecast for the resulting label.
///
/// Name lookups are labelled with the query text; coordinate lookups with the
/// city name OpenWeather returned, or [`LOCATION_FALLBACK_LABEL`].
pub async fn load_weather(provider: &dyn WeatherProvider, query: WeatherQuery) -> LoadOutcome {
    let weather = match provider.current_weather(&query).await {
        Ok(weather) => weather,
        Err(error) => return LoadOutcome::Failed(error),
    };

    let label = match &query.location {
        LocationSpec::ByName(city) => city.clone(),
        LocationSpec::ByCoordinates { .. } if weather.city.trim().is_empty() => {
            LOCATION_FALLBACK_LABEL.to_string()
        }
        LocationSpec::ByCoordinates { .. } => weather.city.clone(),
    };

    match provider.forecast(&label, query.units).await {
        Ok(forecast) => LoadOutcome::Complete { label, weather, forecast },
        Err(error) => {
            warn!(city = %label, error = %error, "forecast fetch failed, showing current weather only");
            LoadOutcome::ForecastUnavailable { label, weather, error }
        }
    }
}

#[derive(Debug)]
pub struct AppController {
    provider: Arc<dyn WeatherProvider>,
    prefs: Preferences,
    state: Mutex<AppState>,
    generation: AtomicU64,
}

impl AppController {
    /// Restore units, last city and history from `prefs`.
    pub fn new(provider: Arc<dyn WeatherProvider>, prefs: Preferences) -> Self {
        let state = AppState {
            units: prefs.units(),
            city_label: prefs.last_city(),
            weather: None,
            forecast: None,
            loading: false,
            error_message: None,
            recent: prefs.recent(),
        };

        Self { provider, prefs, state: Mutex::new(state), generation: AtomicU64::new(0) }
    }

    pub fn state(&self) -> AppState {
        self.state.lock().clone()
    }

    pub fn units(&self) -> Units {
        self.state.lock().units
    }

    /// Look up a city by name. Blank input is ignored.
    pub async fn search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        let (ticket, units) = self.begin();
        info!(city = %query, %units, "searching");
        let outcome = load_weather(&*self.provider, WeatherQuery::by_name(query, units)).await;
        self.finish(ticket, outcome);
    }

    /// Reload whatever city is currently shown.
    pub async fn refresh(&self) {
        let city = self.state.lock().city_label.clone();
        self.search(&city).await;
    }

    /// Look up weather at the geolocator's position.
    pub async fn locate(&self, geolocator: &dyn Geolocator) {
        let (ticket, units) = self.begin();

        let position = match geolocator.current_position().await {
            Ok(position) => position,
            Err(error) => {
                warn!(error = %error, "geolocation failed");
                self.finish_without_position(ticket, error);
                return;
            }
        };

        info!(lat = position.lat, lon = position.lon, %units, "locating");
        let query = WeatherQuery::by_coordinates(position.lat, position.lon, units);
        let outcome = load_weather(&*self.provider, query).await;
        self.finish(ticket, outcome);
    }

    /// Persist the new unit system and reload the current city in it.
    pub async fn set_units(&self, units: Units) {
        let city = {
            let mut state = self.state.lock();
            state.units = units;
            state.city_label.clone()
        };
        if let Err(e) = self.prefs.set_units(units) {
            warn!(error = %e, "failed to persist units");
        }

        if !city.trim().is_empty() {
            self.search(&city).await;
        }
    }

    pub fn clear_recent(&self) {
        let mut state = self.state.lock();
        state.recent.clear();
        if let Err(e) = self.prefs.set_recent(&state.recent) {
            warn!(error = %e, "failed to persist cleared recent searches");
        }
    }

    pub async fn suggest(&self, prefix: &str, limit: u8) -> Result<Vec<CitySuggestion>, WeatherError> {
        self.provider.city_suggestions(prefix, limit).await
    }

    fn begin(&self) -> (u64, Units) {
        let mut state = self.state.lock();
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.loading = true;
        state.error_message = None;
        (ticket, state.units)
    }

    fn finish(&self, ticket: u64, outcome: LoadOutcome) {
        let mut state = self.state.lock();
        if self.generation.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "discarding result of a superseded lookup");
            return;
        }

        state.loading = false;
        match outcome {
            LoadOutcome::Complete { label, weather, forecast } => {
                state.weather = Some(weather);
                state.forecast = Some(forecast);
                state.error_message = None;
                self.remember(&mut state, &label);
            }
            LoadOutcome::ForecastUnavailable { label, weather, .. } => {
                state.weather = Some(weather);
                state.forecast = None;
                state.error_message = None;
                self.remember(&mut state, &label);
            }
            LoadOutcome::Failed(error) => {
                warn!(error = %error, "weather lookup failed");
                state.weather = None;
                state.forecast = None;
                state.error_message = Some(error.to_string());
            }
        }
    }

    fn finish_without_position(&self, ticket: u64, error: GeolocationError) {
        let mut state = self.state.lock();
        if self.generation.load(Ordering::SeqCst) != ticket {
            return;
        }
        state.loading = false;
        state.error_message = Some(error.to_string());
    }

    fn remember(&self, state: &mut AppState, label: &str) {
        state.city_label = label.to_string();
        state.recent.remember(label);

        if let Err(e) = self.prefs.set_recent(&state.recent) {
            warn!(error = %e, "failed to persist recent searches");
        }
        if let Err(e) = self.prefs.set_last_city(label) {
            warn!(error = %e, "failed to persist last city");
        }
    }
}
