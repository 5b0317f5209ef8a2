//! URL construction for the OpenWeather endpoints.

use std::fmt;
use url::Url;

use crate::{config::Config, error::WeatherError, model::Units};

/// The OpenWeather calls this app makes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Endpoint<'a> {
    CurrentByName { city: &'a str, units: Units },
    CurrentByCoordinates { lat: f64, lon: f64, units: Units },
    ForecastByName { city: &'a str, units: Units },
    CitySuggestions { prefix: &'a str, limit: u8 },
}

#[derive(Clone)]
pub struct RequestBuilder {
    api_base_url: String,
    geo_base_url: String,
    api_key: Option<String>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("api_base_url", &self.api_base_url)
            .field("geo_base_url", &self.geo_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl RequestBuilder {
    pub fn new(
        api_base_url: impl Into<String>,
        geo_base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            geo_base_url: geo_base_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api_base_url.clone(),
            config.geo_base_url.clone(),
            config.api_key().ok().map(str::to_owned),
        )
    }

    /// Build the full request URL. The key is checked first so a missing key
    /// never turns into a network call.
    pub fn url(&self, endpoint: Endpoint<'_>) -> Result<String, WeatherError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(WeatherError::missing_api_key)?;

        let url = match endpoint {
            Endpoint::CurrentByName { city, units } => build(
                &self.api_base_url,
                "weather",
                &[("q", city), ("units", units.as_str()), ("appid", api_key)],
            )?,
            Endpoint::CurrentByCoordinates { lat, lon, units } => build(
                &self.api_base_url,
                "weather",
                &[
                    ("lat", &lat.to_string()),
                    ("lon", &lon.to_string()),
                    ("units", units.as_str()),
                    ("appid", api_key),
                ],
            )?,
            Endpoint::ForecastByName { city, units } => build(
                &self.api_base_url,
                "forecast",
                &[("q", city), ("units", units.as_str()), ("appid", api_key)],
            )?,
            Endpoint::CitySuggestions { prefix, limit } => build(
                &self.geo_base_url,
                "direct",
                &[("q", prefix), ("limit", &limit.to_string()), ("appid", api_key)],
            )?,
        };

        Ok(url.into())
    }
}

fn build(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, WeatherError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse_with_params(&raw, params)
        .map_err(|e| WeatherError::Configuration(format!("Invalid OpenWeather URL '{raw}': {e}")))
}
