mod config;
pub mod database;
pub mod migrations;
pub mod settings;

pub use config::Config;
pub use database::{Database, FocusSession, RangeSummary, TodaySummary};
pub use settings::{validate_settings_patch, SettingsStore};

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `POMOTICK_DATA_DIR` wins when set. Otherwise `~/.config/pomotick[-dev]/`
/// based on POMOTICK_ENV (set POMOTICK_ENV=dev for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("POMOTICK_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("POMOTICK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomotick-dev")
            } else {
                base_dir.join("pomotick")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
