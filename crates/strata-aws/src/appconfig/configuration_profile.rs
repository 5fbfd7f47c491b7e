//! `aws_appconfig_configuration_profile`

use super::{
    AppConfigApi, ConfigurationProfile, CreateConfigurationProfileRequest, ProfileType,
    UpdateConfigurationProfileRequest, Validator,
};
use crate::client::{AccountContext, found};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use strata_cloud::{AttributeDiff, AttributeSpec, Attributes, IdentityKey, Reconciler, Result};

/// Written as `<profile_id>:<application_id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationProfileKey {
    pub profile_id: String,
    pub application_id: String,
}

impl IdentityKey for ConfigurationProfileKey {
    const RESOURCE_TYPE: &'static str = "aws_appconfig_configuration_profile";
    const ARITY: usize = 2;
    const DELIMITER: char = ':';

    fn parts(&self) -> Vec<&str> {
        vec![&self.profile_id, &self.application_id]
    }

    fn from_parts(parts: Vec<String>) -> Self {
        let mut parts = parts.into_iter();
        Self {
            profile_id: parts.next().unwrap_or_default(),
            application_id: parts.next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationProfileConfig {
    pub application_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location_uri: String,
    #[serde(default)]
    pub retrieval_role_arn: Option<String>,
    #[serde(default)]
    pub validators: Vec<Validator>,
    #[serde(default, rename = "type")]
    pub profile_type: ProfileType,
}

static SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::required("application_id").forces_replacement(),
    AttributeSpec::required("name"),
    AttributeSpec::optional("description"),
    AttributeSpec::required("location_uri").forces_replacement(),
    AttributeSpec::optional("retrieval_role_arn"),
    AttributeSpec::optional("validators"),
    AttributeSpec::required("type").forces_replacement(),
    AttributeSpec::computed("configuration_profile_id"),
    AttributeSpec::computed("arn"),
];

pub struct ConfigurationProfileReconciler {
    account: AccountContext,
}

impl ConfigurationProfileReconciler {
    pub fn new(account: AccountContext) -> Self {
        Self { account }
    }
}

#[async_trait]
impl<C: AppConfigApi + ?Sized> Reconciler<C> for ConfigurationProfileReconciler {
    type Key = ConfigurationProfileKey;
    type Desired = ConfigurationProfileConfig;
    type Remote = ConfigurationProfile;

    fn schema(&self) -> &'static [AttributeSpec] {
        SCHEMA
    }

    fn desired_attributes(&self, desired: &ConfigurationProfileConfig) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("application_id".into(), json!(desired.application_id));
        attrs.insert("name".into(), json!(desired.name));
        attrs.insert("description".into(), json!(desired.description));
        attrs.insert("location_uri".into(), json!(desired.location_uri));
        attrs.insert("retrieval_role_arn".into(), json!(desired.retrieval_role_arn));
        attrs.insert("validators".into(), json!(desired.validators));
        attrs.insert("type".into(), json!(desired.profile_type));
        attrs
    }

    fn attributes(&self, remote: &ConfigurationProfile) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("application_id".into(), json!(remote.application_id));
        attrs.insert("name".into(), json!(remote.name));
        attrs.insert("description".into(), json!(remote.description));
        attrs.insert("location_uri".into(), json!(remote.location_uri));
        attrs.insert("retrieval_role_arn".into(), json!(remote.retrieval_role_arn));
        attrs.insert("validators".into(), json!(remote.validators));
        attrs.insert("type".into(), json!(remote.profile_type));
        attrs.insert("configuration_profile_id".into(), json!(remote.id));
        attrs.insert(
            "arn".into(),
            json!(self.account.arn(
                "appconfig",
                &format!(
                    "application/{}/configurationprofile/{}",
                    remote.application_id, remote.id
                )
            )),
        );
        attrs
    }

    fn key_of(&self, remote: &ConfigurationProfile) -> ConfigurationProfileKey {
        ConfigurationProfileKey {
            profile_id: remote.id.clone(),
            application_id: remote.application_id.clone(),
        }
    }

    async fn find(
        &self,
        client: &C,
        key: &ConfigurationProfileKey,
    ) -> Result<Option<ConfigurationProfile>> {
        found(
            client
                .get_configuration_profile(&key.application_id, &key.profile_id)
                .await,
        )
    }

    async fn create(
        &self,
        client: &C,
        desired: &ConfigurationProfileConfig,
    ) -> Result<(ConfigurationProfileKey, ConfigurationProfile)> {
        let profile = client
            .create_configuration_profile(CreateConfigurationProfileRequest {
                application_id: desired.application_id.clone(),
                name: desired.name.clone(),
                description: desired.description.clone(),
                location_uri: desired.location_uri.clone(),
                retrieval_role_arn: desired.retrieval_role_arn.clone(),
                validators: desired.validators.clone(),
                profile_type: desired.profile_type,
            })
            .await?;
        Ok((<Self as Reconciler<C>>::key_of(self, &profile), profile))
    }

    async fn update(
        &self,
        client: &C,
        key: &ConfigurationProfileKey,
        desired: &ConfigurationProfileConfig,
        diff: &AttributeDiff,
    ) -> Result<ConfigurationProfile> {
        // Cleared optional strings are sent as empty values
        let mut request = UpdateConfigurationProfileRequest::default();
        if diff.contains("name") {
            request.name = Some(desired.name.clone());
        }
        if diff.contains("description") {
            request.description = Some(desired.description.clone().unwrap_or_default());
        }
        if diff.contains("retrieval_role_arn") {
            request.retrieval_role_arn =
                Some(desired.retrieval_role_arn.clone().unwrap_or_default());
        }
        if diff.contains("validators") {
            request.validators = Some(desired.validators.clone());
        }

        client
            .update_configuration_profile(&key.application_id, &key.profile_id, request)
            .await
    }

    async fn delete_remote(&self, client: &C, key: &ConfigurationProfileKey) -> Result<()> {
        client
            .delete_configuration_profile(&key.application_id, &key.profile_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appconfig::ValidatorType;
    use crate::memory::MemoryCloud;

    type Client = MemoryCloud;

    fn reconciler() -> ConfigurationProfileReconciler {
        ConfigurationProfileReconciler::new(AccountContext::new("aws", "us-east-1", "123456789012"))
    }

    fn profile() -> ConfigurationProfile {
        ConfigurationProfile {
            application_id: "app1234".into(),
            id: "prof567".into(),
            name: "flags".into(),
            description: None,
            location_uri: "hosted".into(),
            retrieval_role_arn: None,
            validators: vec![],
            profile_type: ProfileType::Freeform,
        }
    }

    #[test]
    fn test_key_uses_colon() {
        let key = ConfigurationProfileKey::parse("prof567:app1234").unwrap();
        assert_eq!(key.profile_id, "prof567");
        assert_eq!(key.application_id, "app1234");
        assert!(ConfigurationProfileKey::parse("prof567/app1234").is_err());
    }

    #[test]
    fn test_computed_arn() {
        let attrs = <ConfigurationProfileReconciler as Reconciler<Client>>::attributes(
            &reconciler(),
            &profile(),
        );
        assert_eq!(
            attrs["arn"],
            "arn:aws:appconfig:us-east-1:123456789012:application/app1234/configurationprofile/prof567"
        );
        assert_eq!(attrs["type"], "AWS.Freeform");
    }

    #[test]
    fn test_validator_update_in_place() {
        let r = reconciler();
        let desired: ConfigurationProfileConfig = serde_json::from_value(json!({
            "application_id": "app1234",
            "name": "flags",
            "location_uri": "hosted",
            "validators": [{"type": "JSON_SCHEMA", "content": "{}"}]
        }))
        .unwrap();
        assert_eq!(desired.validators[0].validator_type, ValidatorType::JsonSchema);

        let diff =
            <ConfigurationProfileReconciler as Reconciler<Client>>::diff(&r, &profile(), &desired);
        assert_eq!(diff.names(), vec!["validators"]);
        assert!(!diff.requires_replacement());
    }

    #[test]
    fn test_location_change_forces_replacement() {
        let r = reconciler();
        let desired: ConfigurationProfileConfig = serde_json::from_value(json!({
            "application_id": "app1234",
            "name": "flags",
            "location_uri": "ssm-parameter://flags"
        }))
        .unwrap();
        let diff =
            <ConfigurationProfileReconciler as Reconciler<Client>>::diff(&r, &profile(), &desired);
        assert!(diff.requires_replacement());
    }
}
