//! Small string key-value persistence for user preferences.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::warn;

use crate::{config::project_dirs, model::Units, recent::RecentSearches};

pub const UNITS_KEY: &str = "units";
pub const CITY_KEY: &str = "city";
pub const RECENT_KEY: &str = "recent";

/// City shown before the user has searched for anything.
pub const DEFAULT_CITY: &str = "Sacramento";

pub trait PreferenceStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// TOML file of string values, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences file: {}", path.display()))?;
            toml::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable preferences file");
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, values: Mutex::new(values) })
    }

    /// `preferences.toml` in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(project_dirs()?.data_dir().join("preferences.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences directory: {}", parent.display())
            })?;
        }
        let toml = toml::to_string(&*values).context("Failed to serialize preferences")?;
        fs::write(&self.path, toml)
            .with_context(|| format!("Failed to write preferences file: {}", self.path.display()))
    }
}

/// Typed view over a [`PreferenceStore`].
#[derive(Debug, Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn units(&self) -> Units {
        match self.store.get(UNITS_KEY) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, "ignoring stored units");
                Units::default()
            }),
            None => Units::default(),
        }
    }

    pub fn set_units(&self, units: Units) -> Result<()> {
        self.store.set(UNITS_KEY, units.as_str())
    }

    pub fn last_city(&self) -> String {
        self.store
            .get(CITY_KEY)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CITY.to_string())
    }

    pub fn set_last_city(&self, city: &str) -> Result<()> {
        self.store.set(CITY_KEY, city)
    }

    /// Stored as a JSON array; unreadable data counts as no history.
    pub fn recent(&self) -> RecentSearches {
        let Some(raw) = self.store.get(RECENT_KEY) else {
            return RecentSearches::new();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(list) => RecentSearches::from(list),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable recent searches");
                RecentSearches::new()
            }
        }
    }

    pub fn set_recent(&self, recent: &RecentSearches) -> Result<()> {
        let json = serde_json::to_string(recent).context("Failed to serialize recent searches")?;
        self.store.set(RECENT_KEY, &json)
    }
}
