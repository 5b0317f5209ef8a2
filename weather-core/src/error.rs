use thiserror::Error;

/// Everything that can go wrong while looking up weather.
///
/// Errors are `Clone` because a single in-flight request may settle for many
/// waiting callers at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    /// Missing API key or unusable endpoint configuration.
    #[error("{0}")]
    Configuration(String),

    /// HTTP 401 from the provider.
    #[error("OpenWeather rejected the API key (401). Check your key with `weather configure`.")]
    Authentication,

    /// HTTP 429 after every retry was used up.
    #[error("Rate limited by OpenWeather. Try again in a moment.")]
    RateLimited,

    /// Any other non-2xx response.
    #[error("{}", describe_request_failure(.status, .body))]
    Request { status: u16, body: String },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// A 2xx response whose body could not be decoded.
    #[error("Failed to parse OpenWeather response: {0}")]
    Parse(String),

    #[error(transparent)]
    Geolocation(#[from] GeolocationError),
}

impl WeatherError {
    pub fn missing_api_key() -> Self {
        Self::Configuration("Missing OpenWeather API key".to_string())
    }
}

/// Position lookup failures, following the W3C geolocation error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("Location permission denied. Enable it in browser settings, or search by city.")]
    PermissionDenied,

    #[error("Location unavailable. Try again or search by city.")]
    PositionUnavailable,

    #[error("Location request timed out. Try again or search by city.")]
    Timeout,

    #[error("{}", describe_unknown_location(.0))]
    Unknown(Option<String>),
}

impl GeolocationError {
    /// Map a geolocation error code (1 = denied, 2 = unavailable, 3 = timeout).
    pub fn from_code(code: u16, message: Option<String>) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::Unknown(message),
        }
    }
}

fn describe_unknown_location(message: &Option<String>) -> &str {
    message.as_deref().filter(|m| !m.is_empty()).unwrap_or("Unable to get location.")
}

fn describe_request_failure(status: &u16, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("message").and_then(|m| m.as_str()).map(str::to_owned));

    match message {
        Some(message) if !message.is_empty() => format!("Request failed ({status}): {message}"),
        _ if body.trim().is_empty() => format!("Request failed ({status})"),
        _ => format!("Request failed ({status}): {}", truncate_body(body)),
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
