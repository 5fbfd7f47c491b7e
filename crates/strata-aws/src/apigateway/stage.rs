//! `aws_api_gateway_stage`

use super::{
    AccessLogSettings, ApiGatewayApi, CanarySettings, CreateStageRequest, PatchOperation, Stage,
};
use crate::client::{AccountContext, found};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use strata_cloud::attribute::{self, AttributeChange, UpdatePolicy};
use strata_cloud::{AttributeDiff, AttributeSpec, Attributes, IdentityKey, Reconciler, Result};
use strata_config::CacheSizePolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageKey {
    pub rest_api_id: String,
    pub stage_name: String,
}

impl IdentityKey for StageKey {
    const RESOURCE_TYPE: &'static str = "aws_api_gateway_stage";
    const ARITY: usize = 2;

    fn parts(&self) -> Vec<&str> {
        vec![&self.rest_api_id, &self.stage_name]
    }

    fn from_parts(parts: Vec<String>) -> Self {
        let mut parts = parts.into_iter();
        Self {
            rest_api_id: parts.next().unwrap_or_default(),
            stage_name: parts.next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanarySettingsConfig {
    #[serde(default)]
    pub percent_traffic: Option<Decimal>,
    #[serde(default)]
    pub stage_variable_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub use_stage_cache: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub rest_api_id: String,
    pub stage_name: String,
    pub deployment_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub documentation_version: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub cache_cluster_enabled: bool,
    #[serde(default)]
    pub cache_cluster_size: Option<Decimal>,
    #[serde(default)]
    pub client_certificate_id: Option<String>,
    #[serde(default)]
    pub xray_tracing_enabled: bool,
    #[serde(default)]
    pub access_log_settings: Option<AccessLogSettings>,
    #[serde(default)]
    pub canary_settings: Option<CanarySettingsConfig>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

static SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::required("rest_api_id").forces_replacement(),
    AttributeSpec::required("stage_name").forces_replacement(),
    AttributeSpec::required("deployment_id"),
    AttributeSpec::optional("description"),
    AttributeSpec::optional("documentation_version"),
    AttributeSpec::optional("variables"),
    AttributeSpec::optional("cache_cluster_enabled"),
    AttributeSpec::optional_computed("cache_cluster_size"),
    AttributeSpec::optional("client_certificate_id"),
    AttributeSpec::optional("xray_tracing_enabled"),
    AttributeSpec::optional("access_log_settings"),
    AttributeSpec::optional("canary_settings"),
    AttributeSpec::optional("tags"),
    AttributeSpec::computed("arn"),
    AttributeSpec::computed("execution_arn"),
    AttributeSpec::computed("invoke_url"),
    AttributeSpec::computed("web_acl_arn"),
];

pub struct StageReconciler {
    account: AccountContext,
    cache_size_policy: CacheSizePolicy,
}

impl StageReconciler {
    pub fn new(account: AccountContext, cache_size_policy: CacheSizePolicy) -> Self {
        Self {
            account,
            cache_size_policy,
        }
    }

    pub fn stage_arn(&self, key: &StageKey) -> String {
        self.account.regional_arn(
            "apigateway",
            &format!("/restapis/{}/stages/{}", key.rest_api_id, key.stage_name),
        )
    }

    fn execution_arn(&self, key: &StageKey) -> String {
        self.account.arn(
            "execute-api",
            &format!("{}/{}", key.rest_api_id, key.stage_name),
        )
    }

    fn invoke_url(&self, key: &StageKey) -> String {
        format!(
            "https://{}.execute-api.{}.amazonaws.com/{}",
            key.rest_api_id, self.account.region, key.stage_name
        )
    }

    /// Patch operations for every changed attribute except tags
    fn patch_operations(&self, desired: &StageConfig, diff: &AttributeDiff) -> Vec<PatchOperation> {
        let mut ops = Vec::new();

        for change in &diff.changes {
            match change.name.as_str() {
                "deployment_id" => ops.push(PatchOperation::replace(
                    "/deploymentId",
                    &desired.deployment_id,
                )),
                "description" => ops.push(replace_or_clear("/description", &desired.description)),
                "documentation_version" => ops.push(replace_or_clear(
                    "/documentationVersion",
                    &desired.documentation_version,
                )),
                "client_certificate_id" => ops.push(replace_or_clear(
                    "/clientCertificateId",
                    &desired.client_certificate_id,
                )),
                "variables" => map_patch(&mut ops, "/variables", change),
                "cache_cluster_enabled" => ops.push(PatchOperation::replace(
                    "/cacheClusterEnabled",
                    desired.cache_cluster_enabled.to_string(),
                )),
                "cache_cluster_size" => match desired.cache_cluster_size {
                    Some(size) => {
                        ops.push(PatchOperation::replace("/cacheClusterSize", size.to_string()))
                    }
                    None => ops.push(PatchOperation::remove("/cacheClusterSize")),
                },
                "xray_tracing_enabled" => ops.push(PatchOperation::replace(
                    "/tracingEnabled",
                    desired.xray_tracing_enabled.to_string(),
                )),
                "access_log_settings" => match &desired.access_log_settings {
                    Some(settings) => {
                        ops.push(PatchOperation::replace(
                            "/accessLogSettings/destinationArn",
                            &settings.destination_arn,
                        ));
                        ops.push(PatchOperation::replace(
                            "/accessLogSettings/format",
                            &settings.format,
                        ));
                    }
                    None => ops.push(PatchOperation::remove("/accessLogSettings")),
                },
                "canary_settings" => match &desired.canary_settings {
                    Some(canary) => canary_patch(&mut ops, canary, change),
                    None => ops.push(PatchOperation::remove("/canarySettings")),
                },
                _ => {}
            }
        }

        ops
    }
}

fn replace_or_clear(path: &str, value: &Option<String>) -> PatchOperation {
    PatchOperation::replace(path, value.clone().unwrap_or_default())
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Patch a string map so it matches the desired map exactly
fn map_patch(ops: &mut Vec<PatchOperation>, prefix: &str, change: &AttributeChange) {
    let (upserts, removals) = change.map_delta();
    for (key, value) in upserts {
        ops.push(PatchOperation::replace(
            format!("{}/{}", prefix, key),
            value_string(&value),
        ));
    }
    for key in removals {
        ops.push(PatchOperation::remove(format!("{}/{}", prefix, key)));
    }
}

fn canary_patch(
    ops: &mut Vec<PatchOperation>,
    canary: &CanarySettingsConfig,
    change: &AttributeChange,
) {
    if let Some(percent) = canary.percent_traffic {
        ops.push(PatchOperation::replace(
            "/canarySettings/percentTraffic",
            percent.to_string(),
        ));
    }
    ops.push(PatchOperation::replace(
        "/canarySettings/useStageCache",
        canary.use_stage_cache.to_string(),
    ));

    let overrides = AttributeChange {
        name: "stage_variable_overrides".to_string(),
        before: change
            .before
            .get("stage_variable_overrides")
            .cloned()
            .unwrap_or(Value::Null),
        after: change
            .after
            .get("stage_variable_overrides")
            .cloned()
            .unwrap_or(Value::Null),
        update: UpdatePolicy::InPlace,
    };
    map_patch(ops, "/canarySettings/stageVariableOverrides", &overrides);
}

fn decimal_value(value: Option<Decimal>) -> Value {
    json!(value.map(|d| d.to_string()))
}

fn canary_value(
    percent_traffic: Option<Decimal>,
    overrides: &BTreeMap<String, String>,
    use_stage_cache: bool,
) -> Value {
    json!({
        "percent_traffic": decimal_value(percent_traffic),
        "stage_variable_overrides": overrides,
        "use_stage_cache": use_stage_cache,
    })
}

#[async_trait]
impl<C: ApiGatewayApi + ?Sized> Reconciler<C> for StageReconciler {
    type Key = StageKey;
    type Desired = StageConfig;
    type Remote = Stage;

    fn schema(&self) -> &'static [AttributeSpec] {
        SCHEMA
    }

    fn desired_attributes(&self, desired: &StageConfig) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("rest_api_id".into(), json!(desired.rest_api_id));
        attrs.insert("stage_name".into(), json!(desired.stage_name));
        attrs.insert("deployment_id".into(), json!(desired.deployment_id));
        attrs.insert("description".into(), json!(desired.description));
        attrs.insert(
            "documentation_version".into(),
            json!(desired.documentation_version),
        );
        attrs.insert("variables".into(), json!(desired.variables));
        attrs.insert(
            "cache_cluster_enabled".into(),
            json!(desired.cache_cluster_enabled),
        );
        attrs.insert(
            "cache_cluster_size".into(),
            decimal_value(desired.cache_cluster_size),
        );
        attrs.insert(
            "client_certificate_id".into(),
            json!(desired.client_certificate_id),
        );
        attrs.insert(
            "xray_tracing_enabled".into(),
            json!(desired.xray_tracing_enabled),
        );
        attrs.insert(
            "access_log_settings".into(),
            json!(desired.access_log_settings),
        );
        attrs.insert(
            "canary_settings".into(),
            desired
                .canary_settings
                .as_ref()
                .map(|c| {
                    canary_value(
                        c.percent_traffic,
                        &c.stage_variable_overrides,
                        c.use_stage_cache,
                    )
                })
                .unwrap_or(Value::Null),
        );
        attrs.insert("tags".into(), json!(desired.tags));
        attrs
    }

    fn attributes(&self, remote: &Stage) -> Attributes {
        let key = <Self as Reconciler<C>>::key_of(self, remote);
        let mut attrs = Attributes::new();
        attrs.insert("rest_api_id".into(), json!(remote.rest_api_id));
        attrs.insert("stage_name".into(), json!(remote.stage_name));
        attrs.insert("deployment_id".into(), json!(remote.deployment_id));
        attrs.insert("description".into(), json!(remote.description));
        attrs.insert(
            "documentation_version".into(),
            json!(remote.documentation_version),
        );
        attrs.insert("variables".into(), json!(remote.variables));
        attrs.insert(
            "cache_cluster_enabled".into(),
            json!(remote.cache_cluster_enabled),
        );
        attrs.insert(
            "cache_cluster_size".into(),
            decimal_value(remote.cache_cluster_size),
        );
        attrs.insert(
            "client_certificate_id".into(),
            json!(remote.client_certificate_id),
        );
        attrs.insert(
            "xray_tracing_enabled".into(),
            json!(remote.tracing_enabled),
        );
        attrs.insert(
            "access_log_settings".into(),
            json!(remote.access_log_settings),
        );
        attrs.insert(
            "canary_settings".into(),
            remote
                .canary_settings
                .as_ref()
                .map(|c| {
                    canary_value(
                        c.percent_traffic,
                        &c.stage_variable_overrides,
                        c.use_stage_cache,
                    )
                })
                .unwrap_or(Value::Null),
        );
        attrs.insert("tags".into(), json!(remote.tags));
        attrs.insert("arn".into(), json!(self.stage_arn(&key)));
        attrs.insert("execution_arn".into(), json!(self.execution_arn(&key)));
        attrs.insert("invoke_url".into(), json!(self.invoke_url(&key)));
        attrs.insert("web_acl_arn".into(), json!(remote.web_acl_arn));
        attrs
    }

    fn key_of(&self, remote: &Stage) -> StageKey {
        StageKey {
            rest_api_id: remote.rest_api_id.clone(),
            stage_name: remote.stage_name.clone(),
        }
    }

    fn diff(&self, remote: &Stage, desired: &StageConfig) -> AttributeDiff {
        let mut diff = attribute::diff(
            SCHEMA,
            &<Self as Reconciler<C>>::attributes(self, remote),
            &<Self as Reconciler<C>>::desired_attributes(self, desired),
        );

        // An undeclared size is normally left alone; the clear policy drops
        // it once the cache is off.
        if self.cache_size_policy == CacheSizePolicy::Clear
            && !desired.cache_cluster_enabled
            && desired.cache_cluster_size.is_none()
            && remote.cache_cluster_size.is_some()
        {
            diff.changes.push(AttributeChange {
                name: "cache_cluster_size".to_string(),
                before: decimal_value(remote.cache_cluster_size),
                after: Value::Null,
                update: UpdatePolicy::InPlace,
            });
        }

        diff
    }

    async fn find(&self, client: &C, key: &StageKey) -> Result<Option<Stage>> {
        tracing::debug!("Reading stage {}", key.to_id());
        found(client.get_stage(&key.rest_api_id, &key.stage_name).await)
    }

    async fn create(&self, client: &C, desired: &StageConfig) -> Result<(StageKey, Stage)> {
        let request = CreateStageRequest {
            rest_api_id: desired.rest_api_id.clone(),
            stage_name: desired.stage_name.clone(),
            deployment_id: desired.deployment_id.clone(),
            description: desired.description.clone(),
            documentation_version: desired.documentation_version.clone(),
            variables: desired.variables.clone(),
            cache_cluster_enabled: desired.cache_cluster_enabled,
            cache_cluster_size: desired.cache_cluster_size,
            tracing_enabled: desired.xray_tracing_enabled,
            canary_settings: desired.canary_settings.as_ref().map(|c| CanarySettings {
                deployment_id: None,
                percent_traffic: c.percent_traffic,
                stage_variable_overrides: c.stage_variable_overrides.clone(),
                use_stage_cache: c.use_stage_cache,
            }),
            tags: desired.tags.clone(),
        };
        let stage = client.create_stage(request).await?;
        let key = <Self as Reconciler<C>>::key_of(self, &stage);
        Ok((key, stage))
    }

    async fn settle(
        &self,
        client: &C,
        key: &StageKey,
        desired: &StageConfig,
    ) -> Result<Option<Stage>> {
        // CreateStage takes neither access logging nor a client certificate
        let mut ops = Vec::new();
        if let Some(settings) = &desired.access_log_settings {
            ops.push(PatchOperation::replace(
                "/accessLogSettings/destinationArn",
                &settings.destination_arn,
            ));
            ops.push(PatchOperation::replace(
                "/accessLogSettings/format",
                &settings.format,
            ));
        }
        if let Some(certificate) = &desired.client_certificate_id {
            ops.push(PatchOperation::replace("/clientCertificateId", certificate));
        }
        if ops.is_empty() {
            return Ok(None);
        }

        let stage = client
            .update_stage(&key.rest_api_id, &key.stage_name, ops)
            .await?;
        Ok(Some(stage))
    }

    async fn update(
        &self,
        client: &C,
        key: &StageKey,
        desired: &StageConfig,
        diff: &AttributeDiff,
    ) -> Result<Stage> {
        if let Some(change) = diff.get("tags") {
            let (upserts, removals) = change.map_delta();
            let arn = self.stage_arn(key);
            if !removals.is_empty() {
                client.untag_resource(&arn, removals).await?;
            }
            if !upserts.is_empty() {
                let tags = upserts
                    .into_iter()
                    .map(|(k, v)| (k, value_string(&v)))
                    .collect();
                client.tag_resource(&arn, tags).await?;
            }
        }

        let ops = self.patch_operations(desired, diff);
        if ops.is_empty() {
            return client.get_stage(&key.rest_api_id, &key.stage_name).await;
        }
        tracing::debug!("Patching stage {} with {} operation(s)", key.to_id(), ops.len());
        client
            .update_stage(&key.rest_api_id, &key.stage_name, ops)
            .await?;

        // UpdateStage does not echo tags
        client.get_stage(&key.rest_api_id, &key.stage_name).await
    }

    async fn delete_remote(&self, client: &C, key: &StageKey) -> Result<()> {
        client.delete_stage(&key.rest_api_id, &key.stage_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler(policy: CacheSizePolicy) -> StageReconciler {
        StageReconciler::new(
            AccountContext::new("aws", "us-west-2", "123456789012"),
            policy,
        )
    }

    fn stage() -> Stage {
        Stage {
            rest_api_id: "a1b2c3".into(),
            stage_name: "prod".into(),
            deployment_id: Some("dep1".into()),
            description: None,
            documentation_version: None,
            variables: BTreeMap::new(),
            cache_cluster_enabled: true,
            cache_cluster_size: Some("1.6".parse().unwrap()),
            client_certificate_id: None,
            tracing_enabled: false,
            access_log_settings: None,
            canary_settings: None,
            tags: BTreeMap::new(),
            web_acl_arn: None,
        }
    }

    fn config(value: Value) -> StageConfig {
        serde_json::from_value(value).unwrap()
    }

    // The client type only selects the trait impl
    type Client = crate::memory::MemoryCloud;

    fn diff_of(r: &StageReconciler, remote: &Stage, desired: &StageConfig) -> AttributeDiff {
        <StageReconciler as Reconciler<Client>>::diff(r, remote, desired)
    }

    #[test]
    fn test_import_id() {
        let key = StageKey::parse("a1b2c3/prod").unwrap();
        assert_eq!(key.rest_api_id, "a1b2c3");
        assert_eq!(key.stage_name, "prod");
        assert_eq!(key.to_id(), "a1b2c3/prod");
        assert!(StageKey::parse("a1b2c3").is_err());
        assert!(StageKey::parse("a1b2c3/prod/extra").is_err());
    }

    #[test]
    fn test_computed_attributes() {
        let r = reconciler(CacheSizePolicy::Retain);
        let attrs = <StageReconciler as Reconciler<Client>>::attributes(&r, &stage());
        assert_eq!(
            attrs["arn"],
            json!("arn:aws:apigateway:us-west-2::/restapis/a1b2c3/stages/prod")
        );
        assert_eq!(
            attrs["execution_arn"],
            json!("arn:aws:execute-api:us-west-2:123456789012:a1b2c3/prod")
        );
        assert_eq!(
            attrs["invoke_url"],
            json!("https://a1b2c3.execute-api.us-west-2.amazonaws.com/prod")
        );
        assert_eq!(attrs["cache_cluster_size"], json!("1.6"));
    }

    #[test]
    fn test_disabling_cache_retains_size() {
        let r = reconciler(CacheSizePolicy::Retain);
        let desired = config(json!({
            "rest_api_id": "a1b2c3", "stage_name": "prod", "deployment_id": "dep1"
        }));
        let diff = diff_of(&r, &stage(), &desired);
        assert_eq!(diff.names(), vec!["cache_cluster_enabled"]);

        let ops = r.patch_operations(&desired, &diff);
        assert_eq!(
            ops,
            vec![PatchOperation::replace("/cacheClusterEnabled", "false")]
        );
    }

    #[test]
    fn test_disabling_cache_clears_size_when_configured() {
        let r = reconciler(CacheSizePolicy::Clear);
        let desired = config(json!({
            "rest_api_id": "a1b2c3", "stage_name": "prod", "deployment_id": "dep1"
        }));
        let diff = diff_of(&r, &stage(), &desired);
        assert_eq!(
            diff.names(),
            vec!["cache_cluster_enabled", "cache_cluster_size"]
        );
        let ops = r.patch_operations(&desired, &diff);
        assert!(ops.contains(&PatchOperation::remove("/cacheClusterSize")));
    }

    #[test]
    fn test_decimal_representation_is_kept() {
        let r = reconciler(CacheSizePolicy::Retain);
        let desired = config(json!({
            "rest_api_id": "a1b2c3", "stage_name": "prod", "deployment_id": "dep1",
            "cache_cluster_enabled": true, "cache_cluster_size": "1.6"
        }));
        assert!(diff_of(&r, &stage(), &desired).is_empty());

        let attrs = <StageReconciler as Reconciler<Client>>::desired_attributes(&r, &config(json!({
            "rest_api_id": "a", "stage_name": "b", "deployment_id": "c",
            "canary_settings": { "percent_traffic": "33.33" }
        })));
        assert_eq!(attrs["canary_settings"]["percent_traffic"], json!("33.33"));
    }

    #[test]
    fn test_variable_and_canary_patches() {
        let r = reconciler(CacheSizePolicy::Retain);
        let mut remote = stage();
        remote.variables = [
            ("one".to_string(), "1".to_string()),
            ("three".to_string(), "3".to_string()),
        ]
        .into_iter()
        .collect();
        remote.canary_settings = Some(CanarySettings {
            deployment_id: None,
            percent_traffic: Some("33.33".parse().unwrap()),
            stage_variable_overrides: [("one".to_string(), "3".to_string())].into_iter().collect(),
            use_stage_cache: true,
        });

        let desired = config(json!({
            "rest_api_id": "a1b2c3", "stage_name": "prod", "deployment_id": "dep1",
            "cache_cluster_enabled": true,
            "variables": { "one": "1", "two": "2" },
            "canary_settings": {
                "percent_traffic": "66.66",
                "stage_variable_overrides": { "four": "5" },
                "use_stage_cache": false
            }
        }));
        let diff = diff_of(&r, &remote, &desired);
        assert_eq!(diff.names(), vec!["variables", "canary_settings"]);

        let ops = r.patch_operations(&desired, &diff);
        assert!(ops.contains(&PatchOperation::replace("/variables/two", "2")));
        assert!(ops.contains(&PatchOperation::remove("/variables/three")));
        assert!(ops.contains(&PatchOperation::replace("/canarySettings/percentTraffic", "66.66")));
        assert!(ops.contains(&PatchOperation::replace("/canarySettings/useStageCache", "false")));
        assert!(ops.contains(&PatchOperation::replace(
            "/canarySettings/stageVariableOverrides/four",
            "5"
        )));
        assert!(ops.contains(&PatchOperation::remove(
            "/canarySettings/stageVariableOverrides/one"
        )));
    }

    #[test]
    fn test_rest_api_change_forces_replacement() {
        let r = reconciler(CacheSizePolicy::Retain);
        let desired = config(json!({
            "rest_api_id": "zzz", "stage_name": "prod", "deployment_id": "dep1",
            "cache_cluster_enabled": true
        }));
        assert!(diff_of(&r, &stage(), &desired).requires_replacement());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: std::result::Result<StageConfig, _> = serde_json::from_value(json!({
            "rest_api_id": "a", "stage_name": "b", "deployment_id": "c", "cache_size": "0.5"
        }));
        assert!(result.is_err());
    }
}
