//! AWS Glue Data Catalog

pub mod user_defined_function;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_cloud::Result;

pub use user_defined_function::{
    UserDefinedFunctionConfig, UserDefinedFunctionKey, UserDefinedFunctionReconciler,
};

pub const NOT_FOUND_CODES: &[&str] = &["EntityNotFoundException"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    User,
    Role,
    Group,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "USER",
            PrincipalType::Role => "ROLE",
            PrincipalType::Group => "GROUP",
        }
    }
}

impl std::str::FromStr for PrincipalType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "USER" => Ok(PrincipalType::User),
            "ROLE" => Ok(PrincipalType::Role),
            "GROUP" => Ok(PrincipalType::Group),
            other => Err(format!("unknown principal type {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Jar,
    File,
    Archive,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Jar => "JAR",
            ResourceType::File => "FILE",
            ResourceType::Archive => "ARCHIVE",
        }
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "JAR" => Ok(ResourceType::Jar),
            "FILE" => Ok(ResourceType::File),
            "ARCHIVE" => Ok(ResourceType::Archive),
            other => Err(format!("unknown resource type {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceUri {
    pub resource_type: ResourceType,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedFunction {
    pub catalog_id: String,
    pub database_name: String,
    pub function_name: String,
    pub class_name: String,
    pub owner_name: String,
    pub owner_type: PrincipalType,
    pub resource_uris: Vec<ResourceUri>,
    pub create_time: Option<DateTime<Utc>>,
}

/// Body of `CreateUserDefinedFunction` / `UpdateUserDefinedFunction`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedFunctionInput {
    pub function_name: String,
    pub class_name: String,
    pub owner_name: String,
    pub owner_type: PrincipalType,
    pub resource_uris: Vec<ResourceUri>,
}

#[async_trait]
pub trait GlueApi: Send + Sync {
    async fn get_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
    ) -> Result<UserDefinedFunction>;

    async fn create_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        input: UserDefinedFunctionInput,
    ) -> Result<()>;

    async fn update_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
        input: UserDefinedFunctionInput,
    ) -> Result<()>;

    async fn delete_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
    ) -> Result<()>;
}
