use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Unit system sent to OpenWeather as the `units` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    #[default]
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Units::Metric => Units::Imperial,
            Units::Imperial => Units::Metric,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(Units::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(Units::Imperial),
            _ => Err(format!("Unknown units '{value}'. Supported units: metric, imperial.")),
        }
    }
}

/// Where to look up weather.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSpec {
    ByName(String),
    ByCoordinates { lat: f64, lon: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuery {
    pub location: LocationSpec,
    pub units: Units,
}

impl WeatherQuery {
    pub fn by_name(city: impl Into<String>, units: Units) -> Self {
        Self { location: LocationSpec::ByName(city.into()), units }
    }

    pub fn by_coordinates(lat: f64, lon: f64, units: Units) -> Self {
        Self { location: LocationSpec::ByCoordinates { lat, lon }, units }
    }
}

/// Current conditions, in whatever units the query asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub city: String,
    pub country: Option<String>,
    pub icon: Option<String>,
    pub description: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub temp_min: f64,
    pub temp_max: f64,
    pub wind_speed: f64,
}

impl CurrentWeather {
    /// "Reno, US", or just the city when no country came back.
    pub fn location_label(&self) -> String {
        match self.country.as_deref().filter(|c| !c.is_empty()) {
            Some(country) => format!("{}, {}", self.city, country),
            None => self.city.clone(),
        }
    }
}

/// One representative entry for a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temperature: i64,
    pub icon: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forecast {
    pub city: String,
    pub days: Vec<ForecastDay>,
}

/// A geocoding match for a city prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySuggestion {
    pub name: String,
    pub state: Option<String>,
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Non-empty parts of name, state and country joined with ", ".
    pub label: String,
}
