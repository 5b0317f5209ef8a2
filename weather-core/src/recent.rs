use serde::{Deserialize, Serialize};

pub const MAX_RECENT: usize = 5;

/// Most-recent-first city history, deduplicated ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentSearches(Vec<String>);

impl RecentSearches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `city` to the front, dropping any case-insensitive duplicate and
    /// anything past [`MAX_RECENT`].
    pub fn remember(&mut self, city: &str) {
        let city = city.trim();
        if city.is_empty() {
            return;
        }
        let key = city.to_lowercase();
        self.0.retain(|c| c.to_lowercase() != key);
        self.0.insert(0, city.to_string());
        self.0.truncate(MAX_RECENT);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for RecentSearches {
    /// Normalizes arbitrary stored lists through [`remember`](Self::remember).
    fn from(cities: Vec<String>) -> Self {
        let mut recent = Self::new();
        for city in cities.iter().rev() {
            recent.remember(city);
        }
        recent
    }
}
