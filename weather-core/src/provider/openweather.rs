use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    cache::ResponseCache,
    config::Config,
    error::WeatherError,
    forecast::ForecastResponse,
    model::{CitySuggestion, CurrentWeather, Forecast, LocationSpec, Units, WeatherQuery},
    request::{Endpoint, RequestBuilder},
    transport::ReqwestTransport,
};

use super::WeatherProvider;

/// OpenWeather-backed provider. Weather and forecast responses go through the
/// shared [`ResponseCache`]; suggestions bypass it.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    requests: RequestBuilder,
    cache: ResponseCache,
}

impl OpenWeatherClient {
    pub fn new(requests: RequestBuilder, cache: ResponseCache) -> Self {
        Self { requests, cache }
    }

    pub fn from_config(config: &Config) -> Result<Self, WeatherError> {
        let transport = ReqwestTransport::new(config.timeout())?;
        let cache = ResponseCache::new(Arc::new(transport), (&config.cache).into());
        Ok(Self::new(RequestBuilder::from_config(config), cache))
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    icon: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    sys: Option<OwSys>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    main: OwMain,
    wind: Option<OwWind>,
}

impl From<OwCurrentResponse> for CurrentWeather {
    fn from(parsed: OwCurrentResponse) -> Self {
        let condition = parsed.weather.into_iter().next();
        let (icon, description) = match condition {
            Some(w) => (w.icon, w.description.unwrap_or_default()),
            None => (None, String::new()),
        };

        CurrentWeather {
            city: parsed.name,
            country: parsed.sys.and_then(|s| s.country),
            icon,
            description,
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like,
            humidity: parsed.main.humidity,
            temp_min: parsed.main.temp_min,
            temp_max: parsed.main.temp_max,
            wind_speed: parsed.wind.map_or(0.0, |w| w.speed),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: Option<String>,
    state: Option<String>,
    country: Option<String>,
    lat: f64,
    lon: f64,
}

impl From<OwGeoEntry> for CitySuggestion {
    fn from(entry: OwGeoEntry) -> Self {
        let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let name = trimmed(entry.name).unwrap_or_default();
        let state = trimmed(entry.state);
        let country = trimmed(entry.country);
        let label = [Some(name.as_str()), state.as_deref(), country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        CitySuggestion { name, state, country, lat: entry.lat, lon: entry.lon, label }
    }
}

fn decode<T: serde::de::DeserializeOwned>(json: serde_json::Value) -> Result<T, WeatherError> {
    serde_json::from_value(json).map_err(|e| WeatherError::Parse(e.to_string()))
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self), fields(units = %query.units))]
    async fn current_weather(&self, query: &WeatherQuery) -> Result<CurrentWeather, WeatherError> {
        let endpoint = match &query.location {
            LocationSpec::ByName(city) => Endpoint::CurrentByName { city, units: query.units },
            LocationSpec::ByCoordinates { lat, lon } => {
                Endpoint::CurrentByCoordinates { lat: *lat, lon: *lon, units: query.units }
            }
        };

        let url = self.requests.url(endpoint)?;
        let json = self.cache.fetch_cached(&url).await?;
        let parsed: OwCurrentResponse = decode(json)?;

        Ok(parsed.into())
    }

    #[instrument(skip(self))]
    async fn forecast(&self, city: &str, units: Units) -> Result<Forecast, WeatherError> {
        let url = self.requests.url(Endpoint::ForecastByName { city, units })?;
        let json = self.cache.fetch_cached(&url).await?;
        let parsed: ForecastResponse = decode(json)?;

        Ok(parsed.into_forecast(city))
    }

    #[instrument(skip(self))]
    async fn city_suggestions(
        &self,
        prefix: &str,
        limit: u8,
    ) -> Result<Vec<CitySuggestion>, WeatherError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.requests.url(Endpoint::CitySuggestions { prefix, limit })?;
        let json = self.cache.fetch_uncached(&url).await?;
        let entries: Vec<OwGeoEntry> = decode(json)?;

        Ok(entries.into_iter().map(CitySuggestion::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::CachePolicy,
        transport::{HttpResponse, HttpTransport},
    };
    use parking_lot::Mutex;

    /// Answers by endpoint path and records every URL it was asked for.
    #[derive(Debug, Default)]
    struct RoutedTransport {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpTransport for RoutedTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse, WeatherError> {
            self.seen.lock().push(url.to_string());
            let body = if url.contains("/weather?") {
                r#"{"name":"Reno","sys":{"country":"US"},
                    "weather":[{"icon":"01d","description":"clear sky"}],
                    "main":{"temp":71.6,"feels_like":70.1,"humidity":12,"temp_min":65.0,"temp_max":77.0},
                    "wind":{"speed":4.6}}"#
            } else if url.contains("/forecast?") {
                r#"{"city":{"name":"Reno"},"list":[
                    {"dt_txt":"2024-06-01 12:00:00","main":{"temp":80.4},"weather":[{"icon":"02d","description":"few clouds"}]}]}"#
            } else {
                r#"[{"name":" Reno ","state":"Nevada","country":"US","lat":39.5,"lon":-119.8},
                    {"name":"Renon","state":"","country":"IT","lat":46.5,"lon":11.4}]"#
            };
            Ok(HttpResponse::new(200, body))
        }
    }

    fn client(key: Option<&str>) -> (OpenWeatherClient, Arc<RoutedTransport>) {
        let transport = Arc::new(RoutedTransport::default());
        let cache = ResponseCache::new(transport.clone(), CachePolicy::default());
        let requests = RequestBuilder::new("http://api.test/data/2.5", "http://api.test/geo/1.0", key.map(str::to_owned));
        (OpenWeatherClient::new(requests, cache), transport)
    }

    #[tokio::test]
    async fn current_weather_decodes_consumed_fields() {
        let (client, _) = client(Some("K"));

        let weather = client
            .current_weather(&WeatherQuery::by_name("Reno", Units::Imperial))
            .await
            .expect("weather");

        assert_eq!(weather.city, "Reno");
        assert_eq!(weather.country.as_deref(), Some("US"));
        assert_eq!(weather.icon.as_deref(), Some("01d"));
        assert_eq!(weather.description, "clear sky");
        assert_eq!(weather.humidity, 12);
        assert!((weather.wind_speed - 4.6).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn repeated_weather_lookups_hit_the_cache_but_suggestions_do_not() {
        let (client, transport) = client(Some("K"));
        let query = WeatherQuery::by_coordinates(39.5, -119.8, Units::Metric);

        client.current_weather(&query).await.expect("first");
        client.current_weather(&query).await.expect("second");
        client.forecast("Reno", Units::Metric).await.expect("forecast");
        client.forecast("Reno", Units::Metric).await.expect("forecast again");
        client.city_suggestions("Ren", 5).await.expect("suggest");
        client.city_suggestions("Ren", 5).await.expect("suggest again");

        let seen = transport.seen.lock().clone();
        assert_eq!(seen.len(), 4);
        assert!(seen[0].contains("lat=39.5&lon=-119.8&units=metric"));
    }

    #[tokio::test]
    async fn forecast_collapses_feed() {
        let (client, _) = client(Some("K"));
        let forecast = client.forecast("reno", Units::Imperial).await.expect("forecast");

        assert_eq!(forecast.city, "Reno");
        assert_eq!(forecast.days.len(), 1);
        assert_eq!(forecast.days[0].temperature, 80);
        assert_eq!(forecast.days[0].description, "few clouds");
    }

    #[tokio::test]
    async fn suggestions_build_labels_from_non_empty_parts() {
        let (client, _) = client(Some("K"));
        let suggestions = client.city_suggestions("Ren", 5).await.expect("suggest");

        assert_eq!(suggestions[0].label, "Reno, Nevada, US");
        assert_eq!(suggestions[0].name, "Reno");
        assert_eq!(suggestions[1].label, "Renon, IT");
        assert_eq!(suggestions[1].state, None);
    }

    #[tokio::test]
    async fn blank_prefix_skips_the_network() {
        let (client, transport) = client(Some("K"));
        assert!(client.city_suggestions("  ", 5).await.expect("empty").is_empty());
        assert!(transport.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let (client, transport) = client(None);

        let err = client
            .current_weather(&WeatherQuery::by_name("Reno", Units::Imperial))
            .await
            .unwrap_err();
        assert_eq!(err, WeatherError::missing_api_key());

        assert!(client.forecast("Reno", Units::Imperial).await.is_err());
        assert!(client.city_suggestions("Re", 5).await.is_err());
        assert!(transport.seen.lock().is_empty());
    }

    #[test]
    fn from_config_builds_client() {
        let mut cfg = Config::default();
        cfg.set_api_key("K".into());
        let client = OpenWeatherClient::from_config(&cfg).expect("client");
        assert_eq!(client.cache().policy().max_retries, 1);
    }
}
