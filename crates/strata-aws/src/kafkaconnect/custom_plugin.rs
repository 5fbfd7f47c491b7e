//! `aws_mskconnect_custom_plugin` resource and data source
//!
//! Plugins are immutable. Creation and deletion are asynchronous and are
//! awaited by polling `DescribeCustomPlugin`.

use super::{
    ContentType, CreateCustomPluginRequest, CustomPlugin, CustomPluginLocation, CustomPluginState,
    KafkaConnectApi,
};
use crate::client::found;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strata_cloud::{
    AttributeDiff, AttributeSpec, Attributes, CloudError, DataSource, IdentityKey, Reconciler,
    Result, WaitConfig, wait_until,
};

const RESOURCE_TYPE: &str = "aws_mskconnect_custom_plugin";

/// The plugin ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPluginKey {
    pub arn: String,
}

impl IdentityKey for CustomPluginKey {
    const RESOURCE_TYPE: &'static str = RESOURCE_TYPE;
    const ARITY: usize = 1;
    const TRAILING_REMAINDER: bool = true;

    fn parts(&self) -> Vec<&str> {
        vec![&self.arn]
    }

    fn from_parts(parts: Vec<String>) -> Self {
        Self {
            arn: parts.into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomPluginConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content_type: ContentType,
    pub location: CustomPluginLocation,
}

static SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::required("name").forces_replacement(),
    AttributeSpec::optional("description").forces_replacement(),
    AttributeSpec::required("content_type").forces_replacement(),
    AttributeSpec::required("location").forces_replacement(),
    AttributeSpec::computed("arn"),
    AttributeSpec::computed("latest_revision"),
    AttributeSpec::computed("state"),
];

fn plugin_attributes(plugin: &CustomPlugin) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("name".into(), json!(plugin.name));
    attrs.insert("description".into(), json!(plugin.description));
    attrs.insert("content_type".into(), json!(plugin.content_type));
    attrs.insert("location".into(), json!(plugin.location));
    attrs.insert("arn".into(), json!(plugin.arn));
    attrs.insert("latest_revision".into(), json!(plugin.latest_revision));
    attrs.insert("state".into(), json!(plugin.state));
    attrs
}

pub struct CustomPluginReconciler {
    wait: WaitConfig,
}

impl CustomPluginReconciler {
    pub fn new(wait: WaitConfig) -> Self {
        Self { wait }
    }

    async fn wait_for_active<C: KafkaConnectApi + ?Sized>(
        &self,
        client: &C,
        arn: &str,
    ) -> Result<CustomPlugin> {
        wait_until(&self.wait, &format!("custom plugin {}", arn), || async move {
            let plugin = client.describe_custom_plugin(arn).await?;
            match plugin.state {
                CustomPluginState::Creating | CustomPluginState::Updating => Ok(false),
                CustomPluginState::CreateFailed => Err(CloudError::ApiError(format!(
                    "custom plugin {} failed to create",
                    arn
                ))),
                _ => Ok(true),
            }
        })
        .await?;

        client.describe_custom_plugin(arn).await
    }

    async fn wait_for_deleted<C: KafkaConnectApi + ?Sized>(
        &self,
        client: &C,
        arn: &str,
    ) -> Result<()> {
        wait_until(&self.wait, &format!("deletion of custom plugin {}", arn), || async move {
            Ok(found(client.describe_custom_plugin(arn).await)?.is_none())
        })
        .await
    }
}

#[async_trait]
impl<C: KafkaConnectApi + ?Sized> Reconciler<C> for CustomPluginReconciler {
    type Key = CustomPluginKey;
    type Desired = CustomPluginConfig;
    type Remote = CustomPlugin;

    fn schema(&self) -> &'static [AttributeSpec] {
        SCHEMA
    }

    fn desired_attributes(&self, desired: &CustomPluginConfig) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), json!(desired.name));
        attrs.insert("description".into(), json!(desired.description));
        attrs.insert("content_type".into(), json!(desired.content_type));
        attrs.insert("location".into(), json!(desired.location));
        attrs
    }

    fn attributes(&self, remote: &CustomPlugin) -> Attributes {
        plugin_attributes(remote)
    }

    fn key_of(&self, remote: &CustomPlugin) -> CustomPluginKey {
        CustomPluginKey {
            arn: remote.arn.clone(),
        }
    }

    async fn find(&self, client: &C, key: &CustomPluginKey) -> Result<Option<CustomPlugin>> {
        let plugin = found(client.describe_custom_plugin(&key.arn).await)?;
        // A plugin being deleted is as good as gone
        Ok(plugin.filter(|p| p.state != CustomPluginState::Deleting))
    }

    async fn create(
        &self,
        client: &C,
        desired: &CustomPluginConfig,
    ) -> Result<(CustomPluginKey, CustomPlugin)> {
        let arn = client
            .create_custom_plugin(CreateCustomPluginRequest {
                name: desired.name.clone(),
                description: desired.description.clone(),
                content_type: desired.content_type,
                location: desired.location.clone(),
            })
            .await?;
        // Reported by the service until the plugin leaves CREATING
        let plugin = CustomPlugin {
            arn: arn.clone(),
            name: desired.name.clone(),
            description: desired.description.clone().filter(|d| !d.is_empty()),
            content_type: desired.content_type,
            location: desired.location.clone(),
            state: CustomPluginState::Creating,
            latest_revision: 1,
        };
        Ok((CustomPluginKey { arn }, plugin))
    }

    async fn settle(
        &self,
        client: &C,
        key: &CustomPluginKey,
        _desired: &CustomPluginConfig,
    ) -> Result<Option<CustomPlugin>> {
        tracing::info!("Waiting for custom plugin {} to become active", key.arn);
        self.wait_for_active(client, &key.arn).await.map(Some)
    }

    async fn update(
        &self,
        _client: &C,
        key: &CustomPluginKey,
        _desired: &CustomPluginConfig,
        _diff: &AttributeDiff,
    ) -> Result<CustomPlugin> {
        Err(CloudError::InvalidInput(format!(
            "custom plugin {} is immutable",
            key.arn
        )))
    }

    async fn delete_remote(&self, client: &C, key: &CustomPluginKey) -> Result<()> {
        client.delete_custom_plugin(&key.arn).await?;
        self.wait_for_deleted(client, &key.arn).await
    }

    fn import(&self, raw: &str) -> Result<CustomPluginKey> {
        let key = CustomPluginKey::parse(raw)?;
        if !key.arn.starts_with("arn:") || !key.arn.contains(":custom-plugin/") {
            return Err(CloudError::InvalidImportId {
                resource_type: RESOURCE_TYPE,
                raw: raw.to_string(),
                reason: "expected a custom plugin ARN".to_string(),
            });
        }
        Ok(key)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomPluginQuery {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomPluginOutput {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub description: Option<String>,
    pub latest_revision: i64,
    pub state: CustomPluginState,
}

/// Looks up a custom plugin by its unique name
#[derive(Debug, Default)]
pub struct CustomPluginDataSource;

#[async_trait]
impl<C: KafkaConnectApi + ?Sized> DataSource<C> for CustomPluginDataSource {
    type Query = CustomPluginQuery;
    type Output = CustomPluginOutput;

    fn data_source_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    async fn read(&self, client: &C, query: &CustomPluginQuery) -> Result<CustomPluginOutput> {
        let matches: Vec<_> = client
            .list_custom_plugins()
            .await?
            .into_iter()
            .filter(|p| p.name == query.name)
            .collect();

        let summary = match matches.as_slice() {
            [] => {
                return Err(CloudError::NotFound(format!(
                    "no custom plugin named {}",
                    query.name
                )));
            }
            [one] => one,
            _ => {
                return Err(CloudError::InvalidInput(format!(
                    "{} custom plugins named {}",
                    matches.len(),
                    query.name
                )));
            }
        };

        let plugin = client.describe_custom_plugin(&summary.arn).await?;
        Ok(CustomPluginOutput {
            id: plugin.arn.clone(),
            arn: plugin.arn,
            name: plugin.name,
            description: plugin.description,
            latest_revision: plugin.latest_revision,
            state: plugin.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafkaconnect::S3Location;
    use crate::memory::MemoryCloud;
    use strata_cloud::ErrorKind;

    type Client = MemoryCloud;

    #[test]
    fn test_import_whole_arn() {
        let r = CustomPluginReconciler::new(WaitConfig::default());
        let raw = "arn:aws:kafkaconnect:us-east-1:123456789012:custom-plugin/debezium/a1b2-c3";
        let key = <CustomPluginReconciler as Reconciler<Client>>::import(&r, raw).unwrap();
        assert_eq!(key.arn, raw);
        assert_eq!(key.to_id(), raw);

        let err =
            <CustomPluginReconciler as Reconciler<Client>>::import(&r, "debezium").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_every_change_forces_replacement() {
        let r = CustomPluginReconciler::new(WaitConfig::default());
        let remote = CustomPlugin {
            arn: "arn:aws:kafkaconnect:us-east-1:123456789012:custom-plugin/p/1".into(),
            name: "p".into(),
            description: None,
            content_type: ContentType::Zip,
            location: CustomPluginLocation {
                s3: S3Location {
                    bucket_arn: "arn:aws:s3:::plugins".into(),
                    file_key: "p.zip".into(),
                    object_version: None,
                },
            },
            state: CustomPluginState::Active,
            latest_revision: 1,
        };
        let desired: CustomPluginConfig = serde_json::from_value(json!({
            "name": "p",
            "description": "debezium connector",
            "content_type": "ZIP",
            "location": {"s3": {"bucket_arn": "arn:aws:s3:::plugins", "file_key": "p.zip"}}
        }))
        .unwrap();

        let diff = <CustomPluginReconciler as Reconciler<Client>>::diff(&r, &remote, &desired);
        assert_eq!(diff.names(), vec!["description"]);
        assert!(diff.requires_replacement());
    }
}
