//! AWS AppConfig

pub mod configuration_profile;
pub mod configuration_profiles;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_cloud::Result;

pub use configuration_profile::{
    ConfigurationProfileConfig, ConfigurationProfileKey, ConfigurationProfileReconciler,
};
pub use configuration_profiles::{
    ConfigurationProfilesDataSource, ConfigurationProfilesOutput, ConfigurationProfilesQuery,
};

pub const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidatorType {
    JsonSchema,
    Lambda,
}

impl ValidatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorType::JsonSchema => "JSON_SCHEMA",
            ValidatorType::Lambda => "LAMBDA",
        }
    }
}

impl std::str::FromStr for ValidatorType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "JSON_SCHEMA" => Ok(ValidatorType::JsonSchema),
            "LAMBDA" => Ok(ValidatorType::Lambda),
            other => Err(format!("unknown validator type {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Validator {
    pub content: String,
    #[serde(rename = "type")]
    pub validator_type: ValidatorType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileType {
    #[default]
    #[serde(rename = "AWS.Freeform")]
    Freeform,
    #[serde(rename = "AWS.AppConfig.FeatureFlags")]
    FeatureFlags,
}

impl ProfileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Freeform => "AWS.Freeform",
            ProfileType::FeatureFlags => "AWS.AppConfig.FeatureFlags",
        }
    }
}

impl std::str::FromStr for ProfileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "AWS.Freeform" => Ok(ProfileType::Freeform),
            "AWS.AppConfig.FeatureFlags" => Ok(ProfileType::FeatureFlags),
            other => Err(format!("unknown configuration profile type {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationProfile {
    pub application_id: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location_uri: String,
    pub retrieval_role_arn: Option<String>,
    pub validators: Vec<Validator>,
    pub profile_type: ProfileType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConfigurationProfileRequest {
    pub application_id: String,
    pub name: String,
    pub description: Option<String>,
    pub location_uri: String,
    pub retrieval_role_arn: Option<String>,
    pub validators: Vec<Validator>,
    pub profile_type: ProfileType,
}

/// `UpdateConfigurationProfile` body; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfigurationProfileRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub retrieval_role_arn: Option<String>,
    pub validators: Option<Vec<Validator>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationProfileSummary {
    pub application_id: String,
    pub id: String,
    pub name: String,
    pub location_uri: String,
    pub profile_type: ProfileType,
}

#[async_trait]
pub trait AppConfigApi: Send + Sync {
    async fn get_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
    ) -> Result<ConfigurationProfile>;

    async fn create_configuration_profile(
        &self,
        request: CreateConfigurationProfileRequest,
    ) -> Result<ConfigurationProfile>;

    async fn update_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
        request: UpdateConfigurationProfileRequest,
    ) -> Result<ConfigurationProfile>;

    async fn delete_configuration_profile(&self, application_id: &str, profile_id: &str)
    -> Result<()>;

    /// All profiles of an application, following pagination
    async fn list_configuration_profiles(
        &self,
        application_id: &str,
    ) -> Result<Vec<ConfigurationProfileSummary>>;
}
