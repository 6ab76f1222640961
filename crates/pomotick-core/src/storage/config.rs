//! TOML-based application configuration.
//!
//! Stores:
//! - Timer settings (`[timer]`, camelCase keys as on the wire)
//! - Re-check cadence of the host event loop
//! - Default log filter
//!
//! Configuration is stored at `~/.config/pomotick/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use super::settings::validate_settings_patch;
use crate::error::{ConfigError, Result};
use crate::timer::{TimerSettings, TICK_INTERVAL_MS};

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomotick/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interval of the periodic re-check while a segment runs.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// `tracing` filter used when RUST_LOG is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub timer: TimerSettings,
}

fn default_tick_interval_ms() -> u64 {
    TICK_INTERVAL_MS
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            log_filter: default_log_filter(),
            timer: TimerSettings::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Parse the file at `path`.
    ///
    /// # Errors
    /// Returns an IO error if the file cannot be read and
    /// `ConfigError::LoadFailed` if it is not valid TOML for this schema.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Persist to `path`, replacing the file in one rename.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;

        let tmp = path.with_extension(format!("toml.{}.tmp", std::process::id()));
        std::fs::write(&tmp, content).map_err(|e| save_failed(e.to_string()))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(save_failed(e.to_string()).into());
        }
        Ok(())
    }

    /// Load from the data directory, writing defaults when the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only.
    ///
    /// `timer.*` keys go through the same validation as settings patches
    /// arriving over the bridge.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value is rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;

        if let Some(field) = key.strip_prefix("timer.") {
            let candidate = Self::get_json_value_by_path(&json, key)
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            let mut payload = serde_json::Map::new();
            payload.insert(field.to_string(), candidate);
            validate_settings_patch(&serde_json::Value::Object(payload))?;
        }

        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        if updated.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be greater than 0".into(),
            }
            .into());
        }

        *self = updated;
        Ok(())
    }
}
