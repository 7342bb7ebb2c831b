//! Persisted key-value preferences.
//!
//! A flat JSON object on disk (`bitview.json` in the config dir). Reads take
//! a default that is returned when the key is absent or has the wrong JSON
//! type, matching how the viewer treats preferences: never fatal.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Well-known preference keys.
pub mod keys {
    pub const OPEN_BITSTREAM_PATH: &str = "open_bitstream_path";
    pub const SNAPSHOT_SAVING_PATH: &str = "snapshot_saving_path";
    pub const THEME_NAME: &str = "theme_name";
    pub const PLUGIN_DIR: &str = "plugin_dir";
    pub const THEME_DIR: &str = "theme_dir";
    pub const UPDATE_MANIFEST: &str = "update_manifest";
    pub const FILTER_ORDER: &str = "filter_order";
}

#[derive(Debug, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: IndexMap<String, Value>,
    dirty: bool,
}

impl SettingsStore {
    /// Store that never touches disk (tests, `--no-prefs` style runs).
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file yields an empty store bound to `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            serde_json::from_str::<IndexMap<String, Value>>(&text)
                .with_context(|| format!("Failed to parse settings: {}", path.display()))?
        } else {
            debug!("No settings file at {}, starting empty", path.display());
            IndexMap::new()
        };
        Ok(Self {
            path: Some(path),
            values,
            dirty: false,
        })
    }

    /// Load, falling back to an empty store on a corrupt file.
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(store) => store,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self {
                    path: Some(path),
                    ..Self::default()
                }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.values.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    /// String array; non-string entries are skipped.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Optional path-valued preference (empty string counts as unset).
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if self.values.get(&key) != Some(&value) {
            self.values.insert(key, value);
            self.dirty = true;
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.values.shift_remove(key).is_some();
        self.dirty |= removed;
        removed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write to disk (no-op for in-memory stores).
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.values).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        debug!("Settings saved to {}", path.display());
        self.dirty = false;
        Ok(())
    }

    /// Save, logging instead of failing. Preferences are best-effort.
    pub fn persist(&mut self) {
        if !self.dirty {
            return;
        }
        if let Err(e) = self.save() {
            warn!("{:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let s = SettingsStore::in_memory();
        assert_eq!(s.get_str_or(keys::THEME_NAME, "default"), "default");
        assert!(!s.get_bool_or("x", false));
        assert_eq!(s.get_i64_or("x", 7), 7);
        assert!(s.get_str_list(keys::FILTER_ORDER).is_empty());
    }

    #[test]
    fn test_wrong_type_falls_back() {
        let mut s = SettingsStore::in_memory();
        s.set(keys::THEME_NAME, 42);
        assert_eq!(s.get_str_or(keys::THEME_NAME, "default"), "default");
    }

    #[test]
    fn test_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bitview.json");

        let mut s = SettingsStore::load(&path).unwrap();
        s.set(keys::THEME_NAME, "dark");
        s.set(keys::FILTER_ORDER, vec!["b", "a"]);
        assert!(s.is_dirty());
        s.save().unwrap();
        assert!(!s.is_dirty());

        let s = SettingsStore::load(&path).unwrap();
        assert_eq!(s.get_str_or(keys::THEME_NAME, "default"), "dark");
        assert_eq!(s.get_str_list(keys::FILTER_ORDER), vec!["b", "a"]);
    }

    #[test]
    fn test_saved_file_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bitview.json");

        let mut s = SettingsStore::load(&path).unwrap();
        s.set(keys::THEME_NAME, "dark");
        s.set(keys::PLUGIN_DIR, "/plugins");
        s.set(keys::OPEN_BITSTREAM_PATH, "/clips/a.bin");
        s.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let theme = text.find(keys::THEME_NAME).unwrap();
        let plugins = text.find(keys::PLUGIN_DIR).unwrap();
        let open = text.find(keys::OPEN_BITSTREAM_PATH).unwrap();
        assert!(theme < plugins && plugins < open);

        let reloaded = SettingsStore::load(&path).unwrap();
        assert_eq!(reloaded.get_str_or(keys::OPEN_BITSTREAM_PATH, ""), "/clips/a.bin");
    }

    #[test]
    fn test_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bitview.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(SettingsStore::load(&path).is_err());
        let s = SettingsStore::load_or_default(&path);
        assert_eq!(s.path(), Some(path.as_path()));
        assert!(!s.contains(keys::THEME_NAME));
    }

    #[test]
    fn test_set_same_value_not_dirty() {
        let mut s = SettingsStore::in_memory();
        s.set("k", "v");
        s.save().unwrap();
        s.set("k", "v");
        assert!(!s.is_dirty());
    }
}
