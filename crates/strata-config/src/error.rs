use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: strata.local.yaml, strata.yaml\n\
        - ./.strata/ directory\n\
        - ~/.config/strata/strata.yaml\n\
        or point STRATA_CONFIG_PATH at a file directly"
    )]
    SettingsFileNotFound,

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
