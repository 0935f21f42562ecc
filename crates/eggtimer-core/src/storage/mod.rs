mod config;
pub mod database;

pub use config::{Config, NotificationsConfig, TimerConfig};
pub use database::{CookOutcome, CookRecord, Database, NewCook};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/eggtimer[-dev]/` based on EGGTIMER_ENV.
///
/// Set EGGTIMER_ENV=dev to use the development data directory, or
/// EGGTIMER_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("EGGTIMER_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("EGGTIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("eggtimer-dev")
            } else {
                base_dir.join("eggtimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::NoDataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
