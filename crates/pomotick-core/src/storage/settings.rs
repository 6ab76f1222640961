//! Settings boundary and persistence.
//!
//! Every settings payload coming from outside the process is checked here
//! before the engine sees it. The engine's own normalization only covers
//! values that slipped past this layer.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::Config;
use crate::error::{ConfigError, Result, ValidationError};
use crate::timer::{SettingsPatch, TimerSettings};

const SETTINGS_KEYS: [&str; 5] = [
    "focusMinutes",
    "shortBreakMinutes",
    "longBreakMinutes",
    "longBreakEvery",
    "autoStartNext",
];

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn positive_number(value: &Value, field: &str) -> std::result::Result<f64, ValidationError> {
    match value.as_f64() {
        Some(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(invalid(field, "must be a number > 0")),
    }
}

fn positive_integer(value: &Value, field: &str) -> std::result::Result<f64, ValidationError> {
    let n = value
        .as_f64()
        .ok_or_else(|| invalid(field, "must be an integer > 0"))?;
    if n.is_finite() && n > 0.0 && n.fract() == 0.0 {
        Ok(n)
    } else {
        Err(invalid(field, "must be an integer > 0"))
    }
}

/// Check an untrusted settings payload and turn it into a patch.
///
/// # Errors
/// Rejects non-object payloads, unknown keys, non-positive or non-finite
/// durations, non-integral `longBreakEvery` and non-boolean `autoStartNext`.
pub fn validate_settings_patch(input: &Value) -> std::result::Result<SettingsPatch, ValidationError> {
    let object = input.as_object().ok_or_else(|| ValidationError::InvalidPayload {
        what: "settings".into(),
        message: "expected object".into(),
    })?;

    if let Some(key) = object.keys().find(|k| !SETTINGS_KEYS.contains(&k.as_str())) {
        return Err(ValidationError::UnknownSettingsKey(key.clone()));
    }

    let mut patch = SettingsPatch::default();
    if let Some(v) = object.get("focusMinutes") {
        patch.focus_minutes = Some(positive_number(v, "focusMinutes")?);
    }
    if let Some(v) = object.get("shortBreakMinutes") {
        patch.short_break_minutes = Some(positive_number(v, "shortBreakMinutes")?);
    }
    if let Some(v) = object.get("longBreakMinutes") {
        patch.long_break_minutes = Some(positive_number(v, "longBreakMinutes")?);
    }
    if let Some(v) = object.get("longBreakEvery") {
        patch.long_break_every = Some(positive_integer(v, "longBreakEvery")?);
    }
    if let Some(v) = object.get("autoStartNext") {
        patch.auto_start_next = Some(
            v.as_bool()
                .ok_or_else(|| invalid("autoStartNext", "must be boolean"))?,
        );
    }

    Ok(patch)
}

/// Stored values get the same checks as a patch arriving over the bridge.
fn check_stored(config: Config) -> Result<Config> {
    validate_settings_patch(&serde_json::to_value(&config.timer)?)?;
    if config.tick_interval_ms == 0 {
        return Err(ConfigError::InvalidValue {
            key: "tick_interval_ms".into(),
            message: "must be greater than 0".into(),
        }
        .into());
    }
    Ok(config)
}

/// Durable home of the settings record (the `Config` file).
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    config: Config,
}

impl SettingsStore {
    /// Open the store at `path`.
    ///
    /// A missing file is created with defaults. A file that cannot be parsed,
    /// or whose stored settings fail validation, is replaced by defaults as
    /// well; the problem is logged, not returned.
    ///
    /// # Errors
    /// Returns an error only if the defaults cannot be written.
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            match Config::load_from(path).and_then(check_stored) {
                Ok(config) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                        config,
                    })
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid config, restoring defaults");
                }
            }
        }

        let config = Config::default();
        config.save_to(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Open `config.toml` in the data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(&Config::path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.config.timer
    }

    /// Replace the settings record and persist it.
    pub fn save(&mut self, settings: &TimerSettings) -> Result<()> {
        self.config.timer = settings.clone();
        self.config.save_to(&self.path)
    }

    /// Dot-path set, persisted only if the value is accepted.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.config.clone();
        updated.set(key, value)?;
        updated.save_to(&self.path)?;
        self.config = updated;
        Ok(())
    }

    /// Restore and persist defaults.
    pub fn reset(&mut self) -> Result<()> {
        let defaults = Config::default();
        defaults.save_to(&self.path)?;
        self.config = defaults;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn accepts_partial_patch() {
        let patch = validate_settings_patch(&json!({ "focusMinutes": 0.5, "autoStartNext": true })).unwrap();
        assert_eq!(patch.focus_minutes, Some(0.5));
        assert_eq!(patch.auto_start_next, Some(true));
        assert!(patch.long_break_every.is_none());
    }

    #[test]
    fn accepts_empty_object() {
        assert!(validate_settings_patch(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(
            validate_settings_patch(&json!([1, 2])),
            Err(ValidationError::InvalidPayload { .. })
        ));
        assert!(validate_settings_patch(&Value::Null).is_err());
    }

    #[test]
    fn rejects_unknown_key() {
        assert_eq!(
            validate_settings_patch(&json!({ "focusMinutes": 5, "theme": "dark" })),
            Err(ValidationError::UnknownSettingsKey("theme".into()))
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        for payload in [
            json!({ "focusMinutes": 0 }),
            json!({ "shortBreakMinutes": -1 }),
            json!({ "longBreakMinutes": "15" }),
            json!({ "longBreakEvery": 1.5 }),
            json!({ "longBreakEvery": 0 }),
            json!({ "autoStartNext": 1 }),
        ] {
            assert!(
                matches!(validate_settings_patch(&payload), Err(ValidationError::InvalidValue { .. })),
                "{payload} should be rejected"
            );
        }
    }

    #[test]
    fn open_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.settings(), &TimerSettings::default());
        assert!(path.exists());
    }

    #[test]
    fn open_replaces_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.config(), &Config::default());
        assert!(Config::load_from(&path).is_ok());
    }

    #[test]
    fn open_restores_defaults_for_out_of_range_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nfocusMinutes = -5.0\nlongBreakEvery = 0\n").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.settings(), &TimerSettings::default());
        assert_eq!(store.config().get("timer.focusMinutes").as_deref(), Some("25.0"));

        let on_disk = Config::load_from(&path).unwrap();
        assert_eq!(on_disk, Config::default());
    }

    #[test]
    fn open_restores_defaults_for_zero_tick_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tick_interval_ms = 0\n").unwrap();
        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.config(), &Config::default());
    }

    #[test]
    fn open_keeps_valid_custom_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nfocusMinutes = 50.0\nautoStartNext = true\n").unwrap();
        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.settings().focus_minutes, 50.0);
        assert!(store.settings().auto_start_next);
    }

    #[test]
    fn save_persists_merge() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut store = SettingsStore::open(&path).unwrap();
        let patch = validate_settings_patch(&json!({ "longBreakEvery": 2 })).unwrap();
        let merged = store.settings().merged(&patch);
        store.save(&merged).unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.settings().long_break_every, 2);
        assert_eq!(reopened.settings().focus_minutes, 25.0);
    }

    #[test]
    fn rejected_set_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut store = SettingsStore::open(&path).unwrap();
        store.set("timer.focusMinutes", "45").unwrap();
        assert!(store.set("timer.focusMinutes", "-5").is_err());

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.settings().focus_minutes, 45.0);

        store.reset().unwrap();
        assert_eq!(SettingsStore::open(&path).unwrap().settings().focus_minutes, 25.0);
    }
}
