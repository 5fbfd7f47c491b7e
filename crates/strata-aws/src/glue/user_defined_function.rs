//! `aws_glue_user_defined_function`

use super::{GlueApi, PrincipalType, ResourceUri, UserDefinedFunction, UserDefinedFunctionInput};
use crate::client::{AccountContext, found};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use strata_cloud::{
    AttributeDiff, AttributeSpec, Attributes, CloudError, IdentityKey, Reconciler, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDefinedFunctionKey {
    pub catalog_id: String,
    pub database_name: String,
    pub function_name: String,
}

impl IdentityKey for UserDefinedFunctionKey {
    const RESOURCE_TYPE: &'static str = "aws_glue_user_defined_function";
    const ARITY: usize = 3;

    fn parts(&self) -> Vec<&str> {
        vec![&self.catalog_id, &self.database_name, &self.function_name]
    }

    fn from_parts(parts: Vec<String>) -> Self {
        let mut parts = parts.into_iter();
        Self {
            catalog_id: parts.next().unwrap_or_default(),
            database_name: parts.next().unwrap_or_default(),
            function_name: parts.next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserDefinedFunctionConfig {
    /// Defaults to the account id
    #[serde(default)]
    pub catalog_id: Option<String>,
    pub database_name: String,
    pub name: String,
    pub class_name: String,
    pub owner_name: String,
    pub owner_type: PrincipalType,
    #[serde(default)]
    pub resource_uris: Vec<ResourceUri>,
}

impl UserDefinedFunctionConfig {
    fn input(&self) -> UserDefinedFunctionInput {
        UserDefinedFunctionInput {
            function_name: self.name.clone(),
            class_name: self.class_name.clone(),
            owner_name: self.owner_name.clone(),
            owner_type: self.owner_type,
            resource_uris: self.resource_uris.clone(),
        }
    }
}

static SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::optional_computed("catalog_id").forces_replacement(),
    AttributeSpec::required("database_name").forces_replacement(),
    AttributeSpec::required("name").forces_replacement(),
    AttributeSpec::required("class_name"),
    AttributeSpec::required("owner_name"),
    AttributeSpec::required("owner_type"),
    AttributeSpec::optional("resource_uris"),
    AttributeSpec::computed("arn"),
    AttributeSpec::computed("create_time"),
];

pub struct UserDefinedFunctionReconciler {
    account: AccountContext,
}

impl UserDefinedFunctionReconciler {
    pub fn new(account: AccountContext) -> Self {
        Self { account }
    }
}

#[async_trait]
impl<C: GlueApi + ?Sized> Reconciler<C> for UserDefinedFunctionReconciler {
    type Key = UserDefinedFunctionKey;
    type Desired = UserDefinedFunctionConfig;
    type Remote = UserDefinedFunction;

    fn schema(&self) -> &'static [AttributeSpec] {
        SCHEMA
    }

    fn desired_attributes(&self, desired: &UserDefinedFunctionConfig) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("catalog_id".into(), json!(desired.catalog_id));
        attrs.insert("database_name".into(), json!(desired.database_name));
        attrs.insert("name".into(), json!(desired.name));
        attrs.insert("class_name".into(), json!(desired.class_name));
        attrs.insert("owner_name".into(), json!(desired.owner_name));
        attrs.insert("owner_type".into(), json!(desired.owner_type));
        attrs.insert("resource_uris".into(), json!(desired.resource_uris));
        attrs
    }

    fn attributes(&self, remote: &UserDefinedFunction) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("catalog_id".into(), json!(remote.catalog_id));
        attrs.insert("database_name".into(), json!(remote.database_name));
        attrs.insert("name".into(), json!(remote.function_name));
        attrs.insert("class_name".into(), json!(remote.class_name));
        attrs.insert("owner_name".into(), json!(remote.owner_name));
        attrs.insert("owner_type".into(), json!(remote.owner_type));
        attrs.insert("resource_uris".into(), json!(remote.resource_uris));
        attrs.insert(
            "arn".into(),
            json!(self.account.arn(
                "glue",
                &format!(
                    "userDefinedFunction/{}/{}",
                    remote.database_name, remote.function_name
                )
            )),
        );
        attrs.insert(
            "create_time".into(),
            json!(remote.create_time.map(|t| t.to_rfc3339())),
        );
        attrs
    }

    fn key_of(&self, remote: &UserDefinedFunction) -> UserDefinedFunctionKey {
        UserDefinedFunctionKey {
            catalog_id: remote.catalog_id.clone(),
            database_name: remote.database_name.clone(),
            function_name: remote.function_name.clone(),
        }
    }

    async fn find(
        &self,
        client: &C,
        key: &UserDefinedFunctionKey,
    ) -> Result<Option<UserDefinedFunction>> {
        tracing::debug!("Reading user defined function {}", key.to_id());
        found(
            client
                .get_user_defined_function(&key.catalog_id, &key.database_name, &key.function_name)
                .await,
        )
    }

    async fn create(
        &self,
        client: &C,
        desired: &UserDefinedFunctionConfig,
    ) -> Result<(UserDefinedFunctionKey, UserDefinedFunction)> {
        let key = UserDefinedFunctionKey {
            catalog_id: desired
                .catalog_id
                .clone()
                .unwrap_or_else(|| self.account.account_id.clone()),
            database_name: desired.database_name.clone(),
            function_name: desired.name.clone(),
        };

        client
            .create_user_defined_function(&key.catalog_id, &key.database_name, desired.input())
            .await?;

        let remote = client
            .get_user_defined_function(&key.catalog_id, &key.database_name, &key.function_name)
            .await?;
        Ok((key, remote))
    }

    async fn update(
        &self,
        client: &C,
        key: &UserDefinedFunctionKey,
        desired: &UserDefinedFunctionConfig,
        _diff: &AttributeDiff,
    ) -> Result<UserDefinedFunction> {
        // UpdateUserDefinedFunction replaces the whole function input
        client
            .update_user_defined_function(
                &key.catalog_id,
                &key.database_name,
                &key.function_name,
                desired.input(),
            )
            .await?;
        client
            .get_user_defined_function(&key.catalog_id, &key.database_name, &key.function_name)
            .await
    }

    async fn delete_remote(&self, client: &C, key: &UserDefinedFunctionKey) -> Result<()> {
        client
            .delete_user_defined_function(&key.catalog_id, &key.database_name, &key.function_name)
            .await
    }

    fn import(&self, raw: &str) -> Result<UserDefinedFunctionKey> {
        let key = UserDefinedFunctionKey::parse(raw)?;
        if !key.catalog_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CloudError::InvalidImportId {
                resource_type: UserDefinedFunctionKey::RESOURCE_TYPE,
                raw: raw.to_string(),
                reason: "catalog id must be an account id".to_string(),
            });
        }
        Ok(key)
    }
}
