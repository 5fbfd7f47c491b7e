//! Cloud provider trait definition

use crate::action::{ApplyResult, Plan};
use crate::error::Result;
use crate::engine::Drift;
use crate::state::{ProviderState, ResourceState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cloud provider abstraction trait
///
/// A provider owns its service clients; callers own the state and persist it
/// between calls.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "aws")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Calculate the diff between desired and recorded state
    async fn plan(&self, desired: &ResourceSet, state: &ProviderState) -> Result<Plan>;

    /// Apply the planned actions, recording the outcome into `state`
    async fn apply(
        &self,
        plan: &Plan,
        desired: &ResourceSet,
        state: &mut ProviderState,
    ) -> Result<ApplyResult>;

    /// Re-read every recorded resource and report drift
    async fn refresh(&self, state: &mut ProviderState) -> Result<Vec<Drift>>;

    /// Destroy a specific resource by address (`type:name`)
    async fn destroy(&self, resource_id: &str, state: &mut ProviderState) -> Result<()>;

    /// Destroy all resources recorded in `state`
    async fn destroy_all(&self, state: &mut ProviderState) -> Result<ApplyResult>;

    /// Adopt an existing remote object under `resource_type:name`
    async fn import(
        &self,
        resource_type: &str,
        name: &str,
        raw_id: &str,
        state: &mut ProviderState,
    ) -> Result<ResourceState>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Set of resources to be managed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    /// Resources indexed by type and ID
    pub resources: HashMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        let key = format!("{}:{}", resource.resource_type, resource.id);
        self.resources.insert(key, resource);
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<&ResourceConfig> {
        let key = format!("{}:{}", resource_type, id);
        self.resources.get(&key)
    }

    /// Look up a resource by its full `type:id` key
    pub fn get_by_key(&self, key: &str) -> Option<&ResourceConfig> {
        self.resources.get(key)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }
}

/// Configuration for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "aws_api_gateway_stage")
    pub resource_type: String,

    /// Resource name, unique within its type
    pub id: String,

    /// Provider name
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Resource-specific configuration
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            config,
        }
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

fn default_provider() -> String {
    "aws".to_string()
}

impl FromIterator<ResourceConfig> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = ResourceConfig>>(iter: I) -> Self {
        let mut set = ResourceSet::new();
        for resource in iter {
            set.add(resource);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_set_keys() {
        let set: ResourceSet = vec![
            ResourceConfig::new("aws_api_gateway_stage", "prod", "aws", json!({})),
            ResourceConfig::new("aws_api_gateway_stage", "dev", "aws", json!({})),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert!(set.get("aws_api_gateway_stage", "prod").is_some());
        assert!(set.get_by_key("aws_api_gateway_stage:dev").is_some());
        assert!(set.get_by_key("aws_api_gateway_stage:qa").is_none());
        assert_eq!(set.by_type("aws_api_gateway_stage").len(), 2);
    }

    #[test]
    fn test_resource_config_defaults() {
        let config: ResourceConfig = serde_json::from_value(json!({
            "resource_type": "aws_mskconnect_custom_plugin",
            "id": "debezium",
            "config": { "name": "debezium", "content_type": "ZIP" }
        }))
        .unwrap();
        assert_eq!(config.provider, "aws");
        assert_eq!(config.key(), "aws_mskconnect_custom_plugin:debezium");
        assert_eq!(
            config.get_config::<String>("content_type").as_deref(),
            Some("ZIP")
        );
    }
}
