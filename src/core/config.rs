//! Persisted settings: one flat option map, loaded once at startup.
//!
//! The blob lives under a single key in a small key-value store so the same
//! shape works against any host storage backend. Loading is forgiving: a
//! missing blob, a parse error, or a wrong-typed field all fall back to the
//! defaults for the affected fields, never failing startup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Storage key for the settings blob.
pub const CONFIG_KEY: &str = "nexusNoWaitConfig";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Close the tab after a successful resolution.
    pub auto_close_tab: bool,
    /// Auto-skip the requirements interstitial and tab.
    pub skip_requirements: bool,
    /// Surface failures as blocking alerts.
    pub show_alerts: bool,
    /// Reload the page after a failure. Blunt; can loop if the cause persists.
    pub refresh_on_error: bool,
    /// Network call timeout, milliseconds.
    pub request_timeout: u64,
    /// Delay before auto-close, milliseconds. Too low can abort the download.
    pub close_tab_time: u64,
    /// Verbose logging.
    pub debug: bool,
    /// Audible failure notification (host-provided).
    pub play_error_sound: bool,
    /// Cosmetic suppression of premium upsell banners.
    pub hide_premium_upsells: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_close_tab: true,
            skip_requirements: true,
            show_alerts: true,
            refresh_on_error: false,
            request_timeout: 30_000,
            close_tab_time: 1_000,
            debug: false,
            play_error_sound: true,
            hide_premium_upsells: true,
        }
    }
}

impl Config {
    /// Parse a stored blob, validating field by field: a wrong-typed field
    /// reverts to its default while the rest of the blob is kept.
    pub fn from_blob(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                warn!(error = %e, "settings blob unreadable, using defaults");
                Self::default()
            }
        }
    }

    fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(map) = value.as_object() else {
            return defaults;
        };
        Self {
            auto_close_tab: bool_field(map, "autoCloseTab", defaults.auto_close_tab),
            skip_requirements: bool_field(map, "skipRequirements", defaults.skip_requirements),
            show_alerts: bool_field(map, "showAlerts", defaults.show_alerts),
            refresh_on_error: bool_field(map, "refreshOnError", defaults.refresh_on_error),
            request_timeout: num_field(map, "requestTimeout", defaults.request_timeout),
            close_tab_time: num_field(map, "closeTabTime", defaults.close_tab_time),
            debug: bool_field(map, "debug", defaults.debug),
            play_error_sound: bool_field(map, "playErrorSound", defaults.play_error_sound),
            hide_premium_upsells: bool_field(
                map,
                "hidePremiumUpsells",
                defaults.hide_premium_upsells,
            ),
        }
    }

    /// Load from a store, defaulting when nothing is saved yet.
    pub fn load(store: &dyn ConfigStore) -> Self {
        match store.get(CONFIG_KEY) {
            Some(blob) => Self::from_blob(&blob),
            None => Self::default(),
        }
    }

    pub fn save(&self, store: &dyn ConfigStore) {
        match serde_json::to_string(self) {
            Ok(blob) => store.set(CONFIG_KEY, &blob),
            Err(e) => warn!(error = %e, "failed to serialize settings"),
        }
    }
}

fn bool_field(map: &serde_json::Map<String, Value>, key: &str, default: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn num_field(map: &serde_json::Map<String, Value>, key: &str, default: u64) -> u64 {
    map.get(key).and_then(Value::as_u64).unwrap_or(default)
}

/// Host-provided key-value persistence, consumed synchronously.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn delete(&self, key: &str);
}

/// JSON-file store under the user's home directory.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location: `~/.nexus-nowait/config.json`.
    pub fn default_location() -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self::new(home.join(".nexus-nowait").join("config.json")))
    }

    fn read_map(&self) -> HashMap<String, String> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return HashMap::new();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn write_map(&self, map: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "could not create config directory");
                return;
            }
        }
        match serde_json::to_string_pretty(map) {
            Ok(contents) => {
                if let Err(e) = std::fs::write(&self.path, contents) {
                    warn!(error = %e, path = %self.path.display(), "config write failed");
                }
            }
            Err(e) => warn!(error = %e, "config serialize failed"),
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map);
    }

    fn delete(&self, key: &str) {
        let mut map = self.read_map();
        map.remove(key);
        self.write_map(&map);
    }
}

/// In-memory store for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryConfigStore {
    map: Mutex<HashMap<String, String>>,
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.map.lock().unwrap().insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.map.lock().unwrap().remove(key);
    }
}

/// The single mutation path for settings. Every change persists immediately;
/// the return value tells the caller whether the page context should reload to
/// pick the change up.
pub struct ConfigManager<S: ConfigStore> {
    store: S,
    current: Config,
}

impl<S: ConfigStore> ConfigManager<S> {
    pub fn load(store: S) -> Self {
        let current = Config::load(&store);
        Self { store, current }
    }

    pub fn current(&self) -> &Config {
        &self.current
    }

    /// Set one named option from a JSON value. Unknown names and wrong-typed
    /// values are ignored (the stored blob stays canonical).
    pub fn set_option(&mut self, name: &str, value: Value) -> bool {
        let mut blob = match serde_json::to_value(&self.current) {
            Ok(Value::Object(map)) => map,
            _ => return false,
        };
        if !blob.contains_key(name) {
            debug!(option = name, "ignoring unknown settings option");
            return false;
        }
        blob.insert(name.to_string(), value);
        let updated = Config::from_value(&Value::Object(blob));
        self.apply(updated)
    }

    /// Replace the whole configuration through a closure.
    pub fn update(&mut self, f: impl FnOnce(&mut Config)) -> bool {
        let mut updated = self.current.clone();
        f(&mut updated);
        self.apply(updated)
    }

    /// Drop the persisted blob and return to defaults.
    pub fn reset(&mut self) -> bool {
        self.store.delete(CONFIG_KEY);
        let changed = self.current != Config::default();
        self.current = Config::default();
        self.current.save(&self.store);
        changed
    }

    fn apply(&mut self, updated: Config) -> bool {
        if updated == self.current {
            return false;
        }
        self.current = updated;
        self.current.save(&self.store);
        debug!("settings saved");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_wrong_typed_fields() {
        let cfg = Config::from_blob(r#"{"autoCloseTab":"yes","requestTimeout":5000}"#);
        assert!(cfg.auto_close_tab); // wrong type, back to default
        assert_eq!(cfg.request_timeout, 5_000); // valid field kept
    }

    #[test]
    fn garbage_blob_yields_defaults() {
        assert_eq!(Config::from_blob("not json"), Config::default());
        assert_eq!(Config::from_blob("[1,2,3]"), Config::default());
    }

    #[test]
    fn blob_round_trips_through_store() {
        let store = MemoryConfigStore::default();
        let mut cfg = Config::default();
        cfg.refresh_on_error = true;
        cfg.close_tab_time = 2_500;
        cfg.save(&store);

        let loaded = Config::load(&store);
        assert_eq!(loaded, cfg);
        // keys stay camelCase for blob compatibility
        assert!(store.get(CONFIG_KEY).unwrap().contains("closeTabTime"));
    }

    #[test]
    fn manager_set_option_persists_and_reports_change() {
        let mut manager = ConfigManager::load(MemoryConfigStore::default());
        assert!(manager.set_option("showAlerts", Value::Bool(false)));
        assert!(!manager.current().show_alerts);
        // same value again: no change, nothing to reload
        assert!(!manager.set_option("showAlerts", Value::Bool(false)));
        // wrong-typed value validates back to the previous default
        assert!(manager.set_option("showAlerts", Value::String("x".into())));
        assert!(manager.current().show_alerts);
    }

    #[test]
    fn manager_reset_restores_defaults() {
        let mut manager = ConfigManager::load(MemoryConfigStore::default());
        manager.set_option("debug", Value::Bool(true));
        assert!(manager.reset());
        assert_eq!(*manager.current(), Config::default());
    }
}
