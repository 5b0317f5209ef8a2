//! Response cache with in-flight request sharing and 429 retry.
//!
//! Every weather and forecast call goes through [`ResponseCache::fetch_cached`]:
//!
//! 1. A cached payload younger than the TTL is returned without touching the network.
//! 2. Otherwise, if a request for the same URL is already pending, the caller
//!    waits on that request instead of issuing another one.
//! 3. Otherwise a new request starts. HTTP 429 is retried with linear backoff up
//!    to `max_retries` times, 401 fails immediately, any other non-2xx fails
//!    with the status and body.
//!
//! A URL leaves the in-flight map as soon as its request settles, successful or
//! not, so a failed URL can be fetched fresh by the next caller.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    clock::{Clock, SystemClock},
    config::CacheConfig,
    error::WeatherError,
    transport::HttpTransport,
};

type PendingFetch = Shared<BoxFuture<'static, Result<Value, WeatherError>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        (&CacheConfig::default()).into()
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(cfg: &CacheConfig) -> Self {
        Self { ttl: cfg.ttl(), max_retries: cfg.max_retries, backoff: cfg.backoff() }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    fetched_at: Instant,
}

/// Cheap to clone; clones share the same maps.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    entries: Mutex<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, PendingFetch>>,
}

impl ResponseCache {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: CachePolicy) -> Self {
        Self::with_clock(transport, Arc::new(SystemClock), policy)
    }

    pub fn with_clock(
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                clock,
                policy,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Fetch `url` as JSON, serving from cache or an in-flight request when possible.
    pub async fn fetch_cached(&self, url: &str) -> Result<Value, WeatherError> {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();

            if let Some(payload) = self.inner.fresh_entry(url) {
                debug!(url = %redact_key(url), "cache hit");
                return Ok(payload);
            }

            match in_flight.get(url) {
                Some(pending) => {
                    debug!(url = %redact_key(url), "joining in-flight request");
                    pending.clone()
                }
                None => {
                    let pending = Arc::clone(&self.inner).start(url.to_owned());
                    in_flight.insert(url.to_owned(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Same status handling and retries as [`fetch_cached`](Self::fetch_cached),
    /// without storing or sharing the result.
    pub async fn fetch_uncached(&self, url: &str) -> Result<Value, WeatherError> {
        self.inner.fetch_with_retry(url).await
    }

    pub fn invalidate_all(&self) {
        self.inner.entries.lock().clear();
    }
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("transport", &self.inner.transport)
            .field("policy", &self.inner.policy)
            .field("entries", &self.inner.entries.lock().len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish()
    }
}

impl Inner {
    fn fresh_entry(&self, url: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        let entry = entries.get(url)?;

        if self.clock.now().saturating_duration_since(entry.fetched_at) < self.policy.ttl {
            return Some(entry.payload.clone());
        }

        entries.remove(url);
        None
    }

    /// Insert a fresh entry, dropping every entry that has outlived the TTL.
    fn store(&self, url: &str, payload: Value) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.fetched_at) < self.policy.ttl);
        let swept = before - entries.len();
        if swept > 0 {
            debug!(swept, "dropped expired cache entries");
        }

        entries.insert(url.to_owned(), CacheEntry { payload, fetched_at: now });
    }

    fn start(self: Arc<Self>, url: String) -> PendingFetch {
        async move {
            let result = self.fetch_with_retry(&url).await;

            // Store before leaving the in-flight map so no caller sees neither.
            if let Ok(payload) = &result {
                self.store(&url, payload.clone());
            }
            self.in_flight.lock().remove(&url);

            result
        }
        .boxed()
        .shared()
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Value, WeatherError> {
        let mut attempt = 0u32;

        loop {
            debug!(url = %redact_key(url), attempt, "sending request");
            let response = self.transport.get(url).await?;

            if response.is_success() {
                return serde_json::from_str(&response.body)
                    .map_err(|e| WeatherError::Parse(e.to_string()));
            }

            match response.status {
                401 => return Err(WeatherError::Authentication),
                429 if attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.backoff * attempt;
                    warn!(
                        url = %redact_key(url),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "rate limited, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                429 => return Err(WeatherError::RateLimited),
                status => return Err(WeatherError::Request { status, body: response.body }),
            }
        }
    }
}

/// Hide the `appid` value so keys never reach the logs.
fn redact_key(url: &str) -> String {
    let Some(start) = url.find("appid=").map(|i| i + "appid=".len()) else {
        return url.to_string();
    };
    let end = url[start..].find('&').map_or(url.len(), |i| start + i);
    format!("{}***{}", &url[..start], &url[end..])
}
