//! AWS provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Sandbox state error: {0}")]
    Sandbox(String),

    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] strata_config::ConfigError),

    #[error("Cloud error: {0}")]
    CloudError(#[from] strata_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, AwsError>;
