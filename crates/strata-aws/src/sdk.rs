//! AWS SDK transport
//!
//! Implements the service traits over the official SDK clients. SDK-level
//! retries are disabled; every call goes through [`with_retry`] with the
//! configured policy instead, so throttling is handled the same way for the
//! sandbox and the real services.

use crate::apigateway::{
    self, AccessLogSettings, ApiGatewayApi, CanarySettings, CreateStageRequest, PatchOp,
    PatchOperation, Stage,
};
use crate::appconfig::{
    self, AppConfigApi, ConfigurationProfile, ConfigurationProfileSummary,
    CreateConfigurationProfileRequest, UpdateConfigurationProfileRequest, Validator,
};
use crate::client::{AccountApi, AccountContext, CallerIdentity, retry_config};
use crate::glue::{self, GlueApi, ResourceUri, UserDefinedFunction, UserDefinedFunctionInput};
use crate::iam::{self, AttachedPolicy, IamApi};
use crate::kafkaconnect::{
    self, CreateCustomPluginRequest, CustomPlugin, CustomPluginLocation, CustomPluginSummary,
    KafkaConnectApi, S3Location,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::str::FromStr;
use strata_cloud::error::classify;
use strata_cloud::{CloudError, Result, RetryConfig, with_retry};
use strata_config::Settings;

/// Map an SDK failure onto the error taxonomy
fn map_sdk_error<E, R>(err: SdkError<E, R>, not_found_codes: &[&str]) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            CloudError::Transient(DisplayErrorContext(&err).to_string())
        }
        _ => match err.as_service_error().and_then(|e| e.code()) {
            Some(code) => {
                let message = err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .unwrap_or_default()
                    .to_string();
                classify(code, message, not_found_codes)
            }
            None => CloudError::ApiError(DisplayErrorContext(&err).to_string()),
        },
    }
}

fn unexpected(what: &str, detail: impl std::fmt::Display) -> CloudError {
    CloudError::ApiError(format!("unexpected {} in response: {}", what, detail))
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(|e: String| unexpected("value", e))
}

fn decimal_from_f64(value: f64) -> Result<Decimal> {
    Decimal::from_str(&value.to_string()).map_err(|e| unexpected("number", e))
}

fn decimal_to_f64(value: Decimal) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| CloudError::InvalidInput(format!("{} is not representable", value)))
}

fn to_btree(map: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn to_hash(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// SDK clients for every service the reconcilers touch
pub struct SdkClients {
    account: AccountContext,
    retry: RetryConfig,
    apigateway: aws_sdk_apigateway::Client,
    glue: aws_sdk_glue::Client,
    iam: aws_sdk_iam::Client,
    appconfig: aws_sdk_appconfig::Client,
    kafkaconnect: aws_sdk_kafkaconnect::Client,
    sts: aws_sdk_sts::Client,
}

impl SdkClients {
    /// Build clients from the default credential chain and the configured region
    pub async fn from_settings(settings: &Settings) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .retry_config(aws_config::retry::RetryConfig::disabled())
            .load()
            .await;
        tracing::debug!("Loaded AWS configuration for region {}", settings.region);

        Self {
            account: AccountContext::from(settings),
            retry: retry_config(&settings.retry),
            apigateway: aws_sdk_apigateway::Client::new(&config),
            glue: aws_sdk_glue::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
            appconfig: aws_sdk_appconfig::Client::new(&config),
            kafkaconnect: aws_sdk_kafkaconnect::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
        }
    }

    pub fn account(&self) -> &AccountContext {
        &self.account
    }
}

#[async_trait]
impl AccountApi for SdkClients {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let output = with_retry(&self.retry, "GetCallerIdentity", || async {
            self.sts
                .get_caller_identity()
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &[]))
        })
        .await?;

        Ok(CallerIdentity {
            account: output.account().unwrap_or_default().to_string(),
            arn: output.arn().unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl ApiGatewayApi for SdkClients {
    async fn get_stage(&self, rest_api_id: &str, stage_name: &str) -> Result<Stage> {
        let output = with_retry(&self.retry, "GetStage", || async {
            self.apigateway
                .get_stage()
                .rest_api_id(rest_api_id)
                .stage_name(stage_name)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, apigateway::NOT_FOUND_CODES))
        })
        .await?;

        let canary_settings = match output.canary_settings() {
            Some(canary) => Some(CanarySettings {
                deployment_id: canary.deployment_id().map(str::to_string),
                percent_traffic: Some(decimal_from_f64(canary.percent_traffic())?),
                stage_variable_overrides: to_btree(canary.stage_variable_overrides()),
                use_stage_cache: canary.use_stage_cache(),
            }),
            None => None,
        };

        let cache_cluster_size = output
            .cache_cluster_size()
            .map(|size| Decimal::from_str(size.as_str()).map_err(|e| unexpected("cache size", e)))
            .transpose()?;

        Ok(Stage {
            rest_api_id: rest_api_id.to_string(),
            stage_name: output.stage_name().unwrap_or(stage_name).to_string(),
            deployment_id: output.deployment_id().map(str::to_string),
            description: output.description().map(str::to_string),
            documentation_version: output.documentation_version().map(str::to_string),
            variables: to_btree(output.variables()),
            cache_cluster_enabled: output.cache_cluster_enabled(),
            cache_cluster_size,
            client_certificate_id: output.client_certificate_id().map(str::to_string),
            tracing_enabled: output.tracing_enabled(),
            access_log_settings: output.access_log_settings().map(|s| AccessLogSettings {
                destination_arn: s.destination_arn().unwrap_or_default().to_string(),
                format: s.format().unwrap_or_default().to_string(),
            }),
            canary_settings,
            tags: to_btree(output.tags()),
            web_acl_arn: output.web_acl_arn().map(str::to_string),
        })
    }

    async fn create_stage(&self, request: CreateStageRequest) -> Result<Stage> {
        use aws_sdk_apigateway::types::{self as types, CacheClusterSize};

        let canary = match &request.canary_settings {
            Some(c) => Some(
                types::CanarySettings::builder()
                    .set_percent_traffic(c.percent_traffic.map(decimal_to_f64).transpose()?)
                    .set_deployment_id(c.deployment_id.clone())
                    .set_stage_variable_overrides(Some(to_hash(&c.stage_variable_overrides)))
                    .use_stage_cache(c.use_stage_cache)
                    .build(),
            ),
            None => None,
        };

        with_retry(&self.retry, "CreateStage", || async {
            self.apigateway
                .create_stage()
                .rest_api_id(&request.rest_api_id)
                .stage_name(&request.stage_name)
                .deployment_id(&request.deployment_id)
                .set_description(request.description.clone())
                .set_documentation_version(request.documentation_version.clone())
                .set_variables(Some(to_hash(&request.variables)))
                .cache_cluster_enabled(request.cache_cluster_enabled)
                .set_cache_cluster_size(
                    request
                        .cache_cluster_size
                        .map(|size| CacheClusterSize::from(size.to_string().as_str())),
                )
                .tracing_enabled(request.tracing_enabled)
                .set_canary_settings(canary.clone())
                .set_tags(Some(to_hash(&request.tags)))
                .send()
                .await
                .map_err(|e| map_sdk_error(e, apigateway::NOT_FOUND_CODES))
        })
        .await?;

        self.get_stage(&request.rest_api_id, &request.stage_name)
            .await
    }

    async fn update_stage(
        &self,
        rest_api_id: &str,
        stage_name: &str,
        patch: Vec<PatchOperation>,
    ) -> Result<Stage> {
        use aws_sdk_apigateway::types::{self as types, Op};

        let operations: Vec<types::PatchOperation> = patch
            .iter()
            .map(|p| {
                types::PatchOperation::builder()
                    .op(match p.op {
                        PatchOp::Replace => Op::Replace,
                        PatchOp::Remove => Op::Remove,
                    })
                    .path(&p.path)
                    .set_value(p.value.clone())
                    .build()
            })
            .collect();

        with_retry(&self.retry, "UpdateStage", || async {
            self.apigateway
                .update_stage()
                .rest_api_id(rest_api_id)
                .stage_name(stage_name)
                .set_patch_operations(Some(operations.clone()))
                .send()
                .await
                .map_err(|e| map_sdk_error(e, apigateway::NOT_FOUND_CODES))
        })
        .await?;

        self.get_stage(rest_api_id, stage_name).await
    }

    async fn delete_stage(&self, rest_api_id: &str, stage_name: &str) -> Result<()> {
        with_retry(&self.retry, "DeleteStage", || async {
            self.apigateway
                .delete_stage()
                .rest_api_id(rest_api_id)
                .stage_name(stage_name)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, apigateway::NOT_FOUND_CODES))
        })
        .await
    }

    async fn tag_resource(&self, resource_arn: &str, tags: BTreeMap<String, String>) -> Result<()> {
        with_retry(&self.retry, "TagResource", || async {
            self.apigateway
                .tag_resource()
                .resource_arn(resource_arn)
                .set_tags(Some(to_hash(&tags)))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, apigateway::NOT_FOUND_CODES))
        })
        .await
    }

    async fn untag_resource(&self, resource_arn: &str, tag_keys: Vec<String>) -> Result<()> {
        with_retry(&self.retry, "UntagResource", || async {
            self.apigateway
                .untag_resource()
                .resource_arn(resource_arn)
                .set_tag_keys(Some(tag_keys.clone()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, apigateway::NOT_FOUND_CODES))
        })
        .await
    }
}

fn glue_input(input: &UserDefinedFunctionInput) -> aws_sdk_glue::types::UserDefinedFunctionInput {
    use aws_sdk_glue::types::{self as types, PrincipalType, ResourceType};

    types::UserDefinedFunctionInput::builder()
        .function_name(&input.function_name)
        .class_name(&input.class_name)
        .owner_name(&input.owner_name)
        .owner_type(PrincipalType::from(input.owner_type.as_str()))
        .set_resource_uris(Some(
            input
                .resource_uris
                .iter()
                .map(|uri| {
                    types::ResourceUri::builder()
                        .resource_type(ResourceType::from(uri.resource_type.as_str()))
                        .uri(&uri.uri)
                        .build()
                })
                .collect(),
        ))
        .build()
}

#[async_trait]
impl GlueApi for SdkClients {
    async fn get_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
    ) -> Result<UserDefinedFunction> {
        let output = with_retry(&self.retry, "GetUserDefinedFunction", || async {
            self.glue
                .get_user_defined_function()
                .catalog_id(catalog_id)
                .database_name(database_name)
                .function_name(function_name)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, glue::NOT_FOUND_CODES))
        })
        .await?;

        let function = output.user_defined_function().ok_or_else(|| {
            CloudError::NotFound(format!("user defined function {}", function_name))
        })?;

        let resource_uris = function
            .resource_uris()
            .iter()
            .map(|uri| {
                Ok(ResourceUri {
                    resource_type: parse_enum(
                        uri.resource_type().map(|t| t.as_str()).unwrap_or_default(),
                    )?,
                    uri: uri.uri().unwrap_or_default().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(UserDefinedFunction {
            catalog_id: function.catalog_id().unwrap_or(catalog_id).to_string(),
            database_name: function.database_name().unwrap_or(database_name).to_string(),
            function_name: function.function_name().unwrap_or(function_name).to_string(),
            class_name: function.class_name().unwrap_or_default().to_string(),
            owner_name: function.owner_name().unwrap_or_default().to_string(),
            owner_type: parse_enum(function.owner_type().map(|t| t.as_str()).unwrap_or("USER"))?,
            resource_uris,
            create_time: function
                .create_time()
                .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
        })
    }

    async fn create_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        input: UserDefinedFunctionInput,
    ) -> Result<()> {
        let input = glue_input(&input);
        with_retry(&self.retry, "CreateUserDefinedFunction", || async {
            self.glue
                .create_user_defined_function()
                .catalog_id(catalog_id)
                .database_name(database_name)
                .function_input(input.clone())
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, glue::NOT_FOUND_CODES))
        })
        .await
    }

    async fn update_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
        input: UserDefinedFunctionInput,
    ) -> Result<()> {
        let input = glue_input(&input);
        with_retry(&self.retry, "UpdateUserDefinedFunction", || async {
            self.glue
                .update_user_defined_function()
                .catalog_id(catalog_id)
                .database_name(database_name)
                .function_name(function_name)
                .function_input(input.clone())
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, glue::NOT_FOUND_CODES))
        })
        .await
    }

    async fn delete_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
    ) -> Result<()> {
        with_retry(&self.retry, "DeleteUserDefinedFunction", || async {
            self.glue
                .delete_user_defined_function()
                .catalog_id(catalog_id)
                .database_name(database_name)
                .function_name(function_name)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, glue::NOT_FOUND_CODES))
        })
        .await
    }
}

#[async_trait]
impl IamApi for SdkClients {
    async fn list_attached_user_policies(&self, user_name: &str) -> Result<Vec<AttachedPolicy>> {
        let mut policies = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = with_retry(&self.retry, "ListAttachedUserPolicies", || async {
                self.iam
                    .list_attached_user_policies()
                    .user_name(user_name)
                    .set_marker(marker.clone())
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, iam::NOT_FOUND_CODES))
            })
            .await?;

            policies.extend(page.attached_policies().iter().map(|p| AttachedPolicy {
                policy_name: p.policy_name().unwrap_or_default().to_string(),
                policy_arn: p.policy_arn().unwrap_or_default().to_string(),
            }));

            marker = page.marker().map(str::to_string);
            if !page.is_truncated() || marker.is_none() {
                return Ok(policies);
            }
        }
    }

    async fn attach_user_policy(&self, user_name: &str, policy_arn: &str) -> Result<()> {
        with_retry(&self.retry, "AttachUserPolicy", || async {
            self.iam
                .attach_user_policy()
                .user_name(user_name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, iam::NOT_FOUND_CODES))
        })
        .await
    }

    async fn detach_user_policy(&self, user_name: &str, policy_arn: &str) -> Result<()> {
        with_retry(&self.retry, "DetachUserPolicy", || async {
            self.iam
                .detach_user_policy()
                .user_name(user_name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, iam::NOT_FOUND_CODES))
        })
        .await
    }
}

fn sdk_validators(validators: &[Validator]) -> Result<Vec<aws_sdk_appconfig::types::Validator>> {
    use aws_sdk_appconfig::types::{self as types, ValidatorType};

    validators
        .iter()
        .map(|v| {
            types::Validator::builder()
                .r#type(ValidatorType::from(v.validator_type.as_str()))
                .content(&v.content)
                .build()
                .map_err(|e| CloudError::InvalidInput(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl AppConfigApi for SdkClients {
    async fn get_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
    ) -> Result<ConfigurationProfile> {
        let output = with_retry(&self.retry, "GetConfigurationProfile", || async {
            self.appconfig
                .get_configuration_profile()
                .application_id(application_id)
                .configuration_profile_id(profile_id)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, appconfig::NOT_FOUND_CODES))
        })
        .await?;

        let validators = output
            .validators()
            .iter()
            .map(|v| {
                Ok(Validator {
                    content: v.content().to_string(),
                    validator_type: parse_enum(v.r#type().as_str())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ConfigurationProfile {
            application_id: output.application_id().unwrap_or(application_id).to_string(),
            id: output.id().unwrap_or(profile_id).to_string(),
            name: output.name().unwrap_or_default().to_string(),
            description: output.description().map(str::to_string),
            location_uri: output.location_uri().unwrap_or_default().to_string(),
            retrieval_role_arn: output.retrieval_role_arn().map(str::to_string),
            validators,
            profile_type: parse_enum(output.r#type().unwrap_or("AWS.Freeform"))?,
        })
    }

    async fn create_configuration_profile(
        &self,
        request: CreateConfigurationProfileRequest,
    ) -> Result<ConfigurationProfile> {
        let validators = sdk_validators(&request.validators)?;
        let output = with_retry(&self.retry, "CreateConfigurationProfile", || async {
            self.appconfig
                .create_configuration_profile()
                .application_id(&request.application_id)
                .name(&request.name)
                .set_description(request.description.clone())
                .location_uri(&request.location_uri)
                .set_retrieval_role_arn(request.retrieval_role_arn.clone())
                .set_validators(Some(validators.clone()))
                .r#type(request.profile_type.as_str())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, appconfig::NOT_FOUND_CODES))
        })
        .await?;

        let id = output
            .id()
            .ok_or_else(|| unexpected("configuration profile", "missing id"))?;
        self.get_configuration_profile(&request.application_id, id)
            .await
    }

    async fn update_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
        request: UpdateConfigurationProfileRequest,
    ) -> Result<ConfigurationProfile> {
        let validators = request
            .validators
            .as_deref()
            .map(sdk_validators)
            .transpose()?;

        with_retry(&self.retry, "UpdateConfigurationProfile", || async {
            self.appconfig
                .update_configuration_profile()
                .application_id(application_id)
                .configuration_profile_id(profile_id)
                .set_name(request.name.clone())
                .set_description(request.description.clone())
                .set_retrieval_role_arn(request.retrieval_role_arn.clone())
                .set_validators(validators.clone())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, appconfig::NOT_FOUND_CODES))
        })
        .await?;

        self.get_configuration_profile(application_id, profile_id)
            .await
    }

    async fn delete_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
    ) -> Result<()> {
        with_retry(&self.retry, "DeleteConfigurationProfile", || async {
            self.appconfig
                .delete_configuration_profile()
                .application_id(application_id)
                .configuration_profile_id(profile_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, appconfig::NOT_FOUND_CODES))
        })
        .await
    }

    async fn list_configuration_profiles(
        &self,
        application_id: &str,
    ) -> Result<Vec<ConfigurationProfileSummary>> {
        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = with_retry(&self.retry, "ListConfigurationProfiles", || async {
                self.appconfig
                    .list_configuration_profiles()
                    .application_id(application_id)
                    .set_next_token(next_token.clone())
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, appconfig::NOT_FOUND_CODES))
            })
            .await?;

            for item in page.items() {
                summaries.push(ConfigurationProfileSummary {
                    application_id: item.application_id().unwrap_or(application_id).to_string(),
                    id: item.id().unwrap_or_default().to_string(),
                    name: item.name().unwrap_or_default().to_string(),
                    location_uri: item.location_uri().unwrap_or_default().to_string(),
                    profile_type: parse_enum(item.r#type().unwrap_or("AWS.Freeform"))?,
                });
            }

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(summaries);
            }
        }
    }
}

#[async_trait]
impl KafkaConnectApi for SdkClients {
    async fn describe_custom_plugin(&self, arn: &str) -> Result<CustomPlugin> {
        let output = with_retry(&self.retry, "DescribeCustomPlugin", || async {
            self.kafkaconnect
                .describe_custom_plugin()
                .custom_plugin_arn(arn)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, kafkaconnect::NOT_FOUND_CODES))
        })
        .await?;

        let revision = output
            .latest_revision()
            .ok_or_else(|| unexpected("custom plugin", "missing latest revision"))?;
        let s3 = revision
            .location()
            .and_then(|l| l.s3_location())
            .ok_or_else(|| unexpected("custom plugin", "missing S3 location"))?;

        Ok(CustomPlugin {
            arn: output.custom_plugin_arn().unwrap_or(arn).to_string(),
            name: output.name().unwrap_or_default().to_string(),
            description: output.description().map(str::to_string),
            content_type: parse_enum(
                revision.content_type().map(|t| t.as_str()).unwrap_or_default(),
            )?,
            location: CustomPluginLocation {
                s3: S3Location {
                    bucket_arn: s3.bucket_arn().unwrap_or_default().to_string(),
                    file_key: s3.file_key().unwrap_or_default().to_string(),
                    object_version: s3.object_version().map(str::to_string),
                },
            },
            state: parse_enum(
                output
                    .custom_plugin_state()
                    .map(|s| s.as_str())
                    .unwrap_or_default(),
            )?,
            latest_revision: revision.revision(),
        })
    }

    async fn create_custom_plugin(&self, request: CreateCustomPluginRequest) -> Result<String> {
        use aws_sdk_kafkaconnect::types::{self as types, CustomPluginContentType};

        let s3 = &request.location.s3;
        let location = types::CustomPluginLocation::builder()
            .s3_location(
                types::S3Location::builder()
                    .bucket_arn(&s3.bucket_arn)
                    .file_key(&s3.file_key)
                    .set_object_version(s3.object_version.clone())
                    .build()
                    .map_err(|e| CloudError::InvalidInput(e.to_string()))?,
            )
            .build()
            .map_err(|e| CloudError::InvalidInput(e.to_string()))?;

        let output = with_retry(&self.retry, "CreateCustomPlugin", || async {
            self.kafkaconnect
                .create_custom_plugin()
                .name(&request.name)
                .set_description(request.description.clone())
                .content_type(CustomPluginContentType::from(request.content_type.as_str()))
                .location(location.clone())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, kafkaconnect::NOT_FOUND_CODES))
        })
        .await?;

        output
            .custom_plugin_arn()
            .map(str::to_string)
            .ok_or_else(|| unexpected("custom plugin", "missing ARN"))
    }

    async fn delete_custom_plugin(&self, arn: &str) -> Result<()> {
        with_retry(&self.retry, "DeleteCustomPlugin", || async {
            self.kafkaconnect
                .delete_custom_plugin()
                .custom_plugin_arn(arn)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error(e, kafkaconnect::NOT_FOUND_CODES))
        })
        .await
    }

    async fn list_custom_plugins(&self) -> Result<Vec<CustomPluginSummary>> {
        let mut plugins = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = with_retry(&self.retry, "ListCustomPlugins", || async {
                self.kafkaconnect
                    .list_custom_plugins()
                    .set_next_token(next_token.clone())
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, kafkaconnect::NOT_FOUND_CODES))
            })
            .await?;

            for plugin in page.custom_plugins() {
                plugins.push(CustomPluginSummary {
                    arn: plugin.custom_plugin_arn().unwrap_or_default().to_string(),
                    name: plugin.name().unwrap_or_default().to_string(),
                    state: parse_enum(
                        plugin
                            .custom_plugin_state()
                            .map(|s| s.as_str())
                            .unwrap_or_default(),
                    )?,
                });
            }

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(plugins);
            }
        }
    }
}
