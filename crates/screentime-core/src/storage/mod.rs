mod config;
pub mod database;
mod memory;
pub mod state;

pub use config::{Config, NotificationsConfig, TimerConfig};
pub use database::{CreditKind, CreditRecord, Database, LedgerStats};
pub use memory::MemoryStore;
pub use state::StateStore;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/screentime[-dev]/` based on SCREENTIME_ENV.
///
/// Set SCREENTIME_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SCREENTIME_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("screentime-dev")
    } else {
        base_dir.join("screentime")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
