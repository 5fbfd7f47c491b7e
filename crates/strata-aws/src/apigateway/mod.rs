//! Amazon API Gateway

pub mod stage;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_cloud::Result;

pub use stage::{StageConfig, StageKey, StageReconciler};

/// Error codes meaning the addressed entity does not exist
pub const NOT_FOUND_CODES: &[&str] = &["NotFoundException"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogSettings {
    pub destination_arn: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanarySettings {
    #[serde(default)]
    pub deployment_id: Option<String>,
    #[serde(default)]
    pub percent_traffic: Option<Decimal>,
    #[serde(default)]
    pub stage_variable_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub use_stage_cache: bool,
}

/// A deployment stage as reported by `GetStage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub rest_api_id: String,
    pub stage_name: String,
    pub deployment_id: Option<String>,
    pub description: Option<String>,
    pub documentation_version: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub cache_cluster_enabled: bool,
    pub cache_cluster_size: Option<Decimal>,
    pub client_certificate_id: Option<String>,
    pub tracing_enabled: bool,
    pub access_log_settings: Option<AccessLogSettings>,
    pub canary_settings: Option<CanarySettings>,
    pub tags: BTreeMap<String, String>,
    pub web_acl_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateStageRequest {
    pub rest_api_id: String,
    pub stage_name: String,
    pub deployment_id: String,
    pub description: Option<String>,
    pub documentation_version: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub cache_cluster_enabled: bool,
    pub cache_cluster_size: Option<Decimal>,
    pub tracing_enabled: bool,
    pub canary_settings: Option<CanarySettings>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Replace,
    Remove,
}

/// One JSON-patch style operation of `UpdateStage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Option<String>,
}

impl PatchOperation {
    pub fn replace(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

#[async_trait]
pub trait ApiGatewayApi: Send + Sync {
    async fn get_stage(&self, rest_api_id: &str, stage_name: &str) -> Result<Stage>;

    async fn create_stage(&self, request: CreateStageRequest) -> Result<Stage>;

    async fn update_stage(
        &self,
        rest_api_id: &str,
        stage_name: &str,
        patch: Vec<PatchOperation>,
    ) -> Result<Stage>;

    async fn delete_stage(&self, rest_api_id: &str, stage_name: &str) -> Result<()>;

    async fn tag_resource(&self, resource_arn: &str, tags: BTreeMap<String, String>) -> Result<()>;

    async fn untag_resource(&self, resource_arn: &str, tag_keys: Vec<String>) -> Result<()>;
}
