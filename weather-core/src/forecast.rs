//! Collapses the 3-hourly forecast feed into one entry per day.
//!
//! Each date is represented by its first `12:00:00` sample. Dates without a
//! midday sample (usually the partial first and last days of the window) fall
//! back to their first sample. At most [`MAX_DAYS`] dates are kept, in the order
//! they first appear in the feed.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

use crate::model::{Forecast, ForecastDay};

pub const MAX_DAYS: usize = 5;

const DT_TXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn is_midday(at: &NaiveDateTime) -> bool {
    (at.hour(), at.minute(), at.second()) == (12, 0, 0)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastSample {
    pub dt_txt: String,
    pub main: SampleMain,
    #[serde(default)]
    pub weather: Vec<SampleCondition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleMain {
    pub temp: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleCondition {
    pub icon: Option<String>,
    pub description: Option<String>,
}

/// The forecast endpoint's body, reduced to the fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastSample>,
    pub city: Option<ForecastCity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastCity {
    pub name: Option<String>,
}

impl ForecastResponse {
    /// Collapse the feed; the city name falls back to what was searched.
    pub fn into_forecast(self, query: &str) -> Forecast {
        let days = collapse_daily(&self.list);
        let city = self
            .city
            .and_then(|c| c.name)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| query.to_string());

        Forecast { city, days }
    }
}

pub fn collapse_daily(samples: &[ForecastSample]) -> Vec<ForecastDay> {
    let stamped: Vec<(NaiveDateTime, &ForecastSample)> = samples
        .iter()
        .filter_map(|sample| match NaiveDateTime::parse_from_str(&sample.dt_txt, DT_TXT_FORMAT) {
            Ok(at) => Some((at, sample)),
            Err(e) => {
                warn!(dt_txt = %sample.dt_txt, error = %e, "skipping forecast sample with bad timestamp");
                None
            }
        })
        .collect();

    let mut order: Vec<NaiveDate> = Vec::new();
    let mut chosen: HashMap<NaiveDate, &ForecastSample> = HashMap::new();

    for (at, sample) in &stamped {
        let date = at.date();
        if !order.contains(&date) {
            order.push(date);
        }
        if is_midday(at) {
            chosen.entry(date).or_insert(*sample);
        }
    }

    for (at, sample) in &stamped {
        chosen.entry(at.date()).or_insert(*sample);
    }

    order
        .into_iter()
        .take(MAX_DAYS)
        .filter_map(|date| chosen.get(&date).map(|sample| summarize(date, sample)))
        .collect()
}

fn summarize(date: NaiveDate, sample: &ForecastSample) -> ForecastDay {
    let condition = sample.weather.first();
    ForecastDay {
        date,
        temperature: round_half_up(sample.main.temp),
        icon: condition.and_then(|c| c.icon.clone()),
        description: condition.and_then(|c| c.description.clone()).unwrap_or_default(),
    }
}

/// Halves round toward positive infinity, so -2.5 becomes -2.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dt_txt: &str, temp: f64) -> ForecastSample {
        ForecastSample {
            dt_txt: dt_txt.to_string(),
            main: SampleMain { temp },
            weather: vec![SampleCondition {
                icon: Some(format!("icon-{dt_txt}")),
                description: Some(format!("at {dt_txt}")),
            }],
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn midday_wins_and_first_sample_is_the_fallback() {
        let samples = vec![
            sample("2024-01-01 03:00:00", 40.4),
            sample("2024-01-01 12:00:00", 55.6),
            sample("2024-01-02 06:00:00", 47.2),
        ];

        let days = collapse_daily(&samples);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date("2024-01-01"));
        assert_eq!(days[0].temperature, 56);
        assert_eq!(days[0].description, "at 2024-01-01 12:00:00");
        assert_eq!(days[1].date, date("2024-01-02"));
        assert_eq!(days[1].temperature, 47);
        assert_eq!(days[1].icon.as_deref(), Some("icon-2024-01-02 06:00:00"));
    }

    #[test]
    fn first_midday_sample_wins_over_later_duplicates() {
        let samples = vec![
            sample("2024-03-01 12:00:00", 10.0),
            sample("2024-03-01 12:00:00", 20.0),
        ];

        assert_eq!(collapse_daily(&samples)[0].temperature, 10);
    }

    #[test]
    fn partial_first_day_keeps_its_position() {
        // Feed starting mid-afternoon: day one has no midday sample.
        let samples = vec![
            sample("2024-05-01 15:00:00", 70.0),
            sample("2024-05-01 18:00:00", 65.0),
            sample("2024-05-02 09:00:00", 60.0),
            sample("2024-05-02 12:00:00", 72.0),
        ];

        let days = collapse_daily(&samples);

        assert_eq!(days.iter().map(|d| d.date).collect::<Vec<_>>(), [date("2024-05-01"), date("2024-05-02")]);
        assert_eq!(days[0].temperature, 70);
        assert_eq!(days[1].temperature, 72);
    }

    #[test]
    fn keeps_at_most_five_distinct_dates_in_order() {
        let samples: Vec<_> = (1..=7)
            .flat_map(|d| {
                ["00:00:00", "12:00:00", "21:00:00"]
                    .into_iter()
                    .map(move |t| sample(&format!("2024-02-0{d} {t}"), f64::from(d)))
            })
            .collect();

        let days = collapse_daily(&samples);

        assert_eq!(days.len(), MAX_DAYS);
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        let mut sorted = dates.clone();
        sorted.dedup();
        assert_eq!(sorted, dates);
        assert_eq!(dates[0], date("2024-02-01"));
        assert_eq!(dates[4], date("2024-02-05"));
    }

    #[test]
    fn collapsing_is_idempotent() {
        let samples = vec![
            sample("2024-01-01 09:00:00", 1.0),
            sample("2024-01-01 12:00:00", 2.0),
            sample("2024-01-02 00:00:00", 3.0),
            sample("2024-01-03 12:00:00", 4.0),
        ];
        let once = collapse_daily(&samples);

        let representatives: Vec<_> = samples
            .iter()
            .filter(|s| {
                once.iter().any(|d| d.description == s.weather[0].description.clone().unwrap_or_default())
            })
            .cloned()
            .collect();
        let twice = collapse_daily(&representatives);

        assert_eq!(once, twice);
    }

    #[test]
    fn empty_feed_yields_no_days_and_query_city() {
        assert!(collapse_daily(&[]).is_empty());

        let response: ForecastResponse = serde_json::from_str(r#"{"list":[]}"#).expect("json");
        let forecast = response.into_forecast("Reno");
        assert_eq!(forecast.city, "Reno");
        assert!(forecast.days.is_empty());
    }

    #[test]
    fn bad_timestamps_are_skipped() {
        let samples = vec![sample("yesterday", 1.0), sample("2024-01-01 12:00:00", 2.0)];
        let days = collapse_daily(&samples);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].temperature, 2);
    }

    #[test]
    fn rounding_matches_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.51), -3);
    }

    #[test]
    fn decodes_openweather_forecast_body() {
        let body = r#"{
            "city": {"name": "Sacramento", "country": "US"},
            "list": [
                {"dt": 1, "dt_txt": "2024-01-01 12:00:00", "main": {"temp": 61.3, "humidity": 40},
                 "weather": [{"id": 800, "icon": "01d", "description": "clear sky"}]},
                {"dt": 2, "dt_txt": "2024-01-02 03:00:00", "main": {"temp": 44.0}, "weather": []}
            ]
        }"#;

        let forecast = serde_json::from_str::<ForecastResponse>(body).expect("json").into_forecast("sac");

        assert_eq!(forecast.city, "Sacramento");
        assert_eq!(forecast.days[0].icon.as_deref(), Some("01d"));
        assert_eq!(forecast.days[0].description, "clear sky");
        assert_eq!(forecast.days[0].temperature, 61);
        assert_eq!(forecast.days[1].icon, None);
        assert_eq!(forecast.days[1].description, "");
    }
}
