//! Workspace settings (`strata.yaml`)

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_STATE_DIR: &str = "STRATA_STATE_DIR";

/// What happens to the stage cache size when the cache cluster is disabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSizePolicy {
    /// Keep the previously configured size
    #[default]
    Retain,
    /// Drop the size together with the cache
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
        }
    }
}

/// Polling used while waiting for asynchronous operations (plugin activation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaiterSettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for WaiterSettings {
    fn default() -> Self {
        Self {
            max_retries: 60,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub region: String,
    pub account_id: String,
    pub partition: String,
    pub state_dir: PathBuf,
    pub retry: RetrySettings,
    pub waiter: WaiterSettings,
    pub cache_size_policy: CacheSizePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: "123456789012".to_string(),
            partition: "aws".to_string(),
            state_dir: PathBuf::from(".strata"),
            retry: RetrySettings::default(),
            waiter: WaiterSettings::default(),
            cache_size_policy: CacheSizePolicy::default(),
        }
    }
}

impl Settings {
    /// Parse settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // an empty document means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `AWS_REGION` and `STRATA_STATE_DIR`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(region) = std::env::var(ENV_REGION).ok().filter(|v| !v.is_empty()) {
            tracing::debug!("Region overridden by {}: {}", ENV_REGION, region);
            self.region = region;
        }
        if let Some(dir) = std::env::var(ENV_STATE_DIR).ok().filter(|v| !v.is_empty()) {
            tracing::debug!("State directory overridden by {}: {}", ENV_STATE_DIR, dir);
            self.state_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, reason: &str| {
            Err(ConfigError::Invalid {
                key: key.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.region.is_empty() {
            return invalid("region", "must not be empty");
        }
        if !self.account_id.is_empty()
            && (self.account_id.len() != 12 || !self.account_id.bytes().all(|b| b.is_ascii_digit()))
        {
            return invalid("account_id", "must be a 12 digit AWS account id");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts", "must be at least 1");
        }
        if self.retry.multiplier < 1.0 || self.waiter.multiplier < 1.0 {
            return invalid("multiplier", "backoff multiplier must be >= 1.0");
        }
        if self.waiter.max_retries == 0 {
            return invalid("waiter.max_retries", "must be at least 1");
        }
        Ok(())
    }
}
