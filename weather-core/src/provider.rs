use crate::{
    Config,
    error::WeatherError,
    model::{CitySuggestion, CurrentWeather, Forecast, Units, WeatherQuery},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, query: &WeatherQuery) -> Result<CurrentWeather, WeatherError>;

    /// Five-day forecast collapsed to one entry per day.
    async fn forecast(&self, city: &str, units: Units) -> Result<Forecast, WeatherError>;

    async fn city_suggestions(
        &self,
        prefix: &str,
        limit: u8,
    ) -> Result<Vec<CitySuggestion>, WeatherError>;
}

/// Construct the OpenWeather provider from config.
///
/// Fails up front when no API key is configured, so the problem shows at
/// startup instead of on the first lookup.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn WeatherProvider>, WeatherError> {
    config.api_key()?;
    Ok(Arc::new(OpenWeatherClient::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "Missing OpenWeather API key");
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());

        assert!(provider_from_config(&cfg).is_ok());
    }
}
