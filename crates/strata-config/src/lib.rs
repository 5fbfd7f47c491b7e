pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{CacheSizePolicy, RetrySettings, Settings, WaiterSettings};

use std::path::PathBuf;

pub const ENV_CONFIG_PATH: &str = "STRATA_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["strata.local.yaml", "strata.yaml"];

/// Global configuration directory (`~/.config/strata`)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("strata");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the settings file.
///
/// Search order:
/// 1. `STRATA_CONFIG_PATH` (direct path)
/// 2. current directory: strata.local.yaml, strata.yaml
/// 3. `./.strata/`, same order
/// 4. `~/.config/strata/strata.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points at {}, which does not exist",
            ENV_CONFIG_PATH,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let strata_dir = current_dir.join(".strata");
    if strata_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = strata_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("strata").join("strata.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

/// Load settings from the discovered file, falling back to defaults when
/// none exists, then apply environment overrides.
pub fn load_settings() -> Result<Settings> {
    let settings = match find_settings_file() {
        Ok(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            Settings::from_file(&path)?
        }
        Err(ConfigError::SettingsFileNotFound) => {
            tracing::debug!("No settings file found, using defaults");
            Settings::default()
        }
        Err(e) => return Err(e),
    };
    Ok(settings.with_env_overrides())
}
