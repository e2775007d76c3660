use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

pub const DEFAULT_DEBOUNCE_MS: i64 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Minimum gap between two accepted "time is over" signals on one field of play.
    pub debounce_ms: i64,
    /// Per field of play notification buffer; slower subscribers skip ahead.
    pub relay_capacity: usize,
    /// Live-value push interval while a clock runs. 0 disables it.
    pub heartbeat_ms: u64,
    pub display_tick_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let debug_mode = std::env::var("FOP_TIMER_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            relay_capacity: 256,
            heartbeat_ms: if debug_mode { 1_000 } else { 10_000 },
            display_tick_ms: 100,
        }
    }
}

impl EngineSettings {
    /// Settings for tests and embedded use: no heartbeat traffic.
    pub fn quiet() -> Self {
        Self {
            heartbeat_ms: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredSettings {
    engine: EngineSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StoredSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            StoredSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .engine
            .clone()
    }

    pub fn update_engine(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.engine = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: StoredSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", self.path.display()))?;
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &StoredSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("fop-timer-settings-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let store = SettingsStore::new(scratch_path()).unwrap();
        assert_eq!(store.engine().debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert_eq!(store.engine().relay_capacity, 256);
    }

    #[test]
    fn update_persists_and_reloads() {
        let path = scratch_path();
        let store = SettingsStore::new(path.clone()).unwrap();
        let mut settings = store.engine();
        settings.debounce_ms = 1_500;
        settings.heartbeat_ms = 0;
        store.update_engine(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(reopened.engine(), settings);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = scratch_path();
        fs::write(&path, r#"{"engine":{"debounceMs":250}}"#).unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();

        assert_eq!(store.engine().debounce_ms, 250);
        assert_eq!(store.engine().display_tick_ms, 100);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn reload_rejects_garbage() {
        let path = scratch_path();
        let store = SettingsStore::new(path.clone()).unwrap();
        fs::write(&path, "not json").unwrap();

        assert!(store.reload().is_err());
        let _ = fs::remove_file(path);
    }
}
