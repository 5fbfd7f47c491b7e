//! Amazon MSK Connect

pub mod custom_plugin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_cloud::Result;

pub use custom_plugin::{
    CustomPluginConfig, CustomPluginDataSource, CustomPluginKey, CustomPluginOutput,
    CustomPluginQuery, CustomPluginReconciler,
};

pub const NOT_FOUND_CODES: &[&str] = &["NotFoundException"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Jar,
    Zip,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Jar => "JAR",
            ContentType::Zip => "ZIP",
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "JAR" => Ok(ContentType::Jar),
            "ZIP" => Ok(ContentType::Zip),
            other => Err(format!("unknown plugin content type {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Location {
    pub bucket_arn: String,
    pub file_key: String,
    #[serde(default)]
    pub object_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomPluginLocation {
    pub s3: S3Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomPluginState {
    Creating,
    CreateFailed,
    Active,
    Updating,
    Deleting,
}

impl CustomPluginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomPluginState::Creating => "CREATING",
            CustomPluginState::CreateFailed => "CREATE_FAILED",
            CustomPluginState::Active => "ACTIVE",
            CustomPluginState::Updating => "UPDATING",
            CustomPluginState::Deleting => "DELETING",
        }
    }
}

impl std::str::FromStr for CustomPluginState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CREATING" => Ok(CustomPluginState::Creating),
            "CREATE_FAILED" => Ok(CustomPluginState::CreateFailed),
            "ACTIVE" => Ok(CustomPluginState::Active),
            "UPDATING" => Ok(CustomPluginState::Updating),
            "DELETING" => Ok(CustomPluginState::Deleting),
            other => Err(format!("unknown custom plugin state {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPlugin {
    pub arn: String,
    pub name: String,
    pub description: Option<String>,
    pub content_type: ContentType,
    pub location: CustomPluginLocation,
    pub state: CustomPluginState,
    pub latest_revision: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCustomPluginRequest {
    pub name: String,
    pub description: Option<String>,
    pub content_type: ContentType,
    pub location: CustomPluginLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPluginSummary {
    pub arn: String,
    pub name: String,
    pub state: CustomPluginState,
}

#[async_trait]
pub trait KafkaConnectApi: Send + Sync {
    async fn describe_custom_plugin(&self, arn: &str) -> Result<CustomPlugin>;

    /// Starts plugin creation; returns the new plugin's ARN
    async fn create_custom_plugin(&self, request: CreateCustomPluginRequest) -> Result<String>;

    async fn delete_custom_plugin(&self, arn: &str) -> Result<()>;

    /// All custom plugins, following pagination
    async fn list_custom_plugins(&self) -> Result<Vec<CustomPluginSummary>>;
}
