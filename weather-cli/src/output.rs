//! Plain-text rendering of controller state.

use chrono::{Local, NaiveDate};
use std::fmt::Write;
use weather_core::{AppState, CitySuggestion, CurrentWeather, Forecast, RecentSearches, Units};

/// Errors are not rendered here; the caller reports them.
pub fn render_state(state: &AppState) -> String {
    let mut out = String::new();

    if let Some(weather) = &state.weather {
        render_weather(&mut out, weather, state.units);
        match &state.forecast {
            Some(forecast) => render_forecast(&mut out, forecast, state.units),
            None => out.push_str("\nForecast unavailable.\n"),
        }
    }

    if !state.recent.is_empty() {
        let _ = writeln!(out, "\nRecent: {}", state.recent.as_slice().join(" · "));
    }

    out
}

fn render_weather(out: &mut String, weather: &CurrentWeather, units: Units) {
    let t = units.temperature_symbol();
    let _ = writeln!(out, "{}", weather.location_label());
    let _ = writeln!(out, "  {:.0}{t}  {}", weather.temperature, weather.description);
    let _ = writeln!(
        out,
        "  Feels like {:.0}{t} · Low {:.0}{t} · High {:.0}{t}",
        weather.feels_like, weather.temp_min, weather.temp_max
    );
    let _ = writeln!(
        out,
        "  Humidity {}% · Wind {:.1} {}",
        weather.humidity,
        weather.wind_speed,
        units.speed_symbol()
    );
}

fn render_forecast(out: &mut String, forecast: &Forecast, units: Units) {
    if forecast.days.is_empty() {
        out.push_str("\nNo forecast data.\n");
        return;
    }

    let today = Local::now().date_naive();
    let _ = writeln!(out, "\n5-day forecast for {}", forecast.city);
    for day in &forecast.days {
        let _ = writeln!(
            out,
            "  {:<10}  {:>4}{}  {}",
            day_label(day.date, today),
            day.temperature,
            units.temperature_symbol(),
            day.description
        );
    }
}

fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else {
        date.format("%a %b %e").to_string()
    }
}

pub fn render_suggestions(suggestions: &[CitySuggestion]) -> String {
    if suggestions.is_empty() {
        return "No matching cities.\n".to_string();
    }

    suggestions.iter().fold(String::new(), |mut out, s| {
        let _ = writeln!(out, "{}  ({:.2}, {:.2})", s.label, s.lat, s.lon);
        out
    })
}

pub fn render_recent(recent: &RecentSearches) -> String {
    if recent.is_empty() {
        return "No recent searches.\n".to_string();
    }

    recent.iter().enumerate().fold(String::new(), |mut out, (i, city)| {
        let _ = writeln!(out, "{}. {city}", i + 1);
        out
    })
}
