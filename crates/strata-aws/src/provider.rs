//! AWS cloud provider

use crate::apigateway::StageReconciler;
use crate::appconfig::{ConfigurationProfileReconciler, ConfigurationProfilesDataSource};
use crate::client::{AccountContext, AwsApi, wait_config};
use crate::error::AwsError;
use crate::glue::UserDefinedFunctionReconciler;
use crate::iam::UserPolicyAttachmentReconciler;
use crate::kafkaconnect::{CustomPluginDataSource, CustomPluginReconciler};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use strata_cloud::{
    ApplyResult, AuthStatus, CloudError, CloudProvider, DataSource, Drift, Engine, Plan,
    ProviderState, Registry, ResourceSet, ResourceState,
};
use strata_config::Settings;

/// Every AWS resource type with its reconciler
pub fn registry<C: AwsApi + 'static>(settings: &Settings) -> Registry<C> {
    let account = AccountContext::from(settings);
    Registry::new()
        .with(StageReconciler::new(
            account.clone(),
            settings.cache_size_policy,
        ))
        .with(UserDefinedFunctionReconciler::new(account.clone()))
        .with(UserPolicyAttachmentReconciler::new())
        .with(ConfigurationProfileReconciler::new(account))
        .with(CustomPluginReconciler::new(wait_config(&settings.waiter)))
}

/// Data source types served by [`AwsProvider::read_data`]
pub const DATA_SOURCE_TYPES: &[&str] = &[
    "aws_appconfig_configuration_profiles",
    "aws_mskconnect_custom_plugin",
];

/// AWS provider over any client implementing the service traits
pub struct AwsProvider<C: AwsApi + 'static> {
    engine: Engine<C>,
    settings: Settings,
}

impl<C: AwsApi + 'static> AwsProvider<C> {
    pub fn new(client: C, settings: Settings) -> Self {
        let engine = Engine::new(Box::new(client), registry(&settings));
        Self { engine, settings }
    }

    pub fn client(&self) -> &C {
        self.engine.client()
    }

    pub fn engine(&self) -> &Engine<C> {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.engine.registry().resource_types()
    }

    /// Normalize an import id for `resource_type`
    pub fn parse_id(&self, resource_type: &str, raw: &str) -> strata_cloud::Result<String> {
        self.engine.parse_id(resource_type, raw)
    }

    /// Apply `plan`, cleaning up objects it created if `cancel` resolves first
    pub async fn apply_until<F>(
        &self,
        plan: &Plan,
        desired: &ResourceSet,
        state: &mut ProviderState,
        cancel: F,
    ) -> strata_cloud::Result<ApplyResult>
    where
        F: Future<Output = ()>,
    {
        self.engine.apply_until(plan, desired, state, cancel).await
    }

    /// Run a data source lookup with a JSON query
    pub async fn read_data(&self, data_source_type: &str, query: &Value) -> crate::Result<Value> {
        match data_source_type {
            "aws_appconfig_configuration_profiles" => {
                read_with(&ConfigurationProfilesDataSource, self.client(), query).await
            }
            "aws_mskconnect_custom_plugin" => {
                read_with(&CustomPluginDataSource, self.client(), query).await
            }
            other => Err(AwsError::UnknownDataSource(other.to_string())),
        }
    }
}

async fn read_with<C, D>(source: &D, client: &C, query: &Value) -> crate::Result<Value>
where
    C: Sync + ?Sized,
    D: DataSource<C>,
{
    let query: D::Query = serde_json::from_value(query.clone()).map_err(|e| {
        CloudError::InvalidInput(format!(
            "invalid {} query: {}",
            source.data_source_type(),
            e
        ))
    })?;
    let output = source.read(client, &query).await?;
    Ok(serde_json::to_value(output)?)
}

#[async_trait]
impl<C: AwsApi + 'static> CloudProvider for AwsProvider<C> {
    fn name(&self) -> &str {
        "aws"
    }

    fn display_name(&self) -> &str {
        "Amazon Web Services"
    }

    async fn check_auth(&self) -> strata_cloud::Result<AuthStatus> {
        match self.client().caller_identity().await {
            Ok(identity) if identity.account != self.settings.account_id => {
                Ok(AuthStatus::failed(format!(
                    "credentials belong to account {}, settings expect {}",
                    identity.account, self.settings.account_id
                )))
            }
            Ok(identity) => Ok(AuthStatus::ok(format!(
                "{} ({})",
                identity.arn, identity.account
            ))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn plan(
        &self,
        desired: &ResourceSet,
        state: &ProviderState,
    ) -> strata_cloud::Result<Plan> {
        self.engine.plan(desired, state).await
    }

    async fn apply(
        &self,
        plan: &Plan,
        desired: &ResourceSet,
        state: &mut ProviderState,
    ) -> strata_cloud::Result<ApplyResult> {
        self.engine.apply(plan, desired, state).await
    }

    async fn refresh(&self, state: &mut ProviderState) -> strata_cloud::Result<Vec<Drift>> {
        self.engine.refresh(state).await
    }

    async fn destroy(
        &self,
        resource_id: &str,
        state: &mut ProviderState,
    ) -> strata_cloud::Result<()> {
        self.engine.destroy(resource_id, state).await
    }

    async fn destroy_all(&self, state: &mut ProviderState) -> strata_cloud::Result<ApplyResult> {
        self.engine.destroy_all(state).await
    }

    async fn import(
        &self,
        resource_type: &str,
        name: &str,
        raw_id: &str,
        state: &mut ProviderState,
    ) -> strata_cloud::Result<ResourceState> {
        self.engine.import(resource_type, name, raw_id, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCloud;
    use serde_json::json;

    fn provider() -> AwsProvider<MemoryCloud> {
        let settings = Settings::default();
        AwsProvider::new(MemoryCloud::new(AccountContext::from(&settings)), settings)
    }

    #[test]
    fn test_registers_every_resource_type() {
        assert_eq!(
            provider().resource_types(),
            vec![
                "aws_api_gateway_stage",
                "aws_appconfig_configuration_profile",
                "aws_glue_user_defined_function",
                "aws_iam_user_policy_attachment",
                "aws_mskconnect_custom_plugin",
            ]
        );
    }

    #[test]
    fn test_parse_id_dispatches_by_type() {
        let provider = provider();
        assert_eq!(
            provider
                .parse_id("aws_appconfig_configuration_profile", "prof1:app1")
                .unwrap(),
            "prof1:app1"
        );
        assert!(provider.parse_id("aws_s3_bucket", "b").is_err());
    }

    #[tokio::test]
    async fn test_check_auth_compares_account() {
        let provider = provider();
        assert!(provider.check_auth().await.unwrap().authenticated);

        let settings = Settings {
            account_id: "999999999999".into(),
            ..Settings::default()
        };
        let mismatched = AwsProvider::new(
            MemoryCloud::new(AccountContext::new("aws", "us-east-1", "123456789012")),
            settings,
        );
        let status = mismatched.check_auth().await.unwrap();
        assert!(!status.authenticated);
        assert!(status.error.unwrap().contains("999999999999"));
    }

    #[tokio::test]
    async fn test_unknown_data_source() {
        let err = provider()
            .read_data("aws_s3_objects", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AwsError::UnknownDataSource(_)));
    }
}
