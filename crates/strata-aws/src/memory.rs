//! In-memory AWS sandbox
//!
//! [`MemoryCloud`] implements every service trait against a local object
//! store with the same validation and error codes as the real APIs. It backs
//! the `sandbox` CLI backend (persisted as JSON between runs) and the test
//! suite. Faults can be injected per operation to exercise retries.

use crate::apigateway::{
    self, AccessLogSettings, ApiGatewayApi, CanarySettings, CreateStageRequest, PatchOp,
    PatchOperation, Stage,
};
use crate::appconfig::{
    self, AppConfigApi, ConfigurationProfile, ConfigurationProfileSummary,
    CreateConfigurationProfileRequest, UpdateConfigurationProfileRequest,
};
use crate::client::{AccountApi, AccountContext, CallerIdentity};
use crate::error::AwsError;
use crate::glue::{self, GlueApi, UserDefinedFunction, UserDefinedFunctionInput};
use crate::iam::{self, AttachedPolicy, IamApi};
use crate::kafkaconnect::{
    self, CreateCustomPluginRequest, CustomPlugin, CustomPluginState, CustomPluginSummary,
    KafkaConnectApi,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use strata_cloud::error::classify;
use strata_cloud::{CloudError, Result, RetryConfig, with_retry};

/// Cache cluster sizes API Gateway accepts, in GB
pub const CACHE_CLUSTER_SIZES: &[&str] = &[
    "0.5", "1.6", "6.1", "13.5", "28.4", "58.2", "118", "237",
];

const DEFAULT_CACHE_CLUSTER_SIZE: &str = "0.5";

#[derive(Debug, Default, Serialize, Deserialize)]
struct RestApi {
    name: String,
    deployments: BTreeSet<String>,
    stages: BTreeMap<String, Stage>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Application {
    name: String,
    profiles: BTreeMap<String, ConfigurationProfile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PluginEntry {
    plugin: CustomPlugin,
    polls_until_active: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Inner {
    next_id: u64,
    rest_apis: BTreeMap<String, RestApi>,
    /// catalog id -> database -> function
    glue_catalogs: BTreeMap<String, BTreeMap<String, BTreeMap<String, UserDefinedFunction>>>,
    /// user -> attached policy ARNs
    iam_users: BTreeMap<String, BTreeSet<String>>,
    /// customer managed policy ARN -> name
    iam_policies: BTreeMap<String, String>,
    applications: BTreeMap<String, Application>,
    custom_plugins: BTreeMap<String, PluginEntry>,
    /// operation -> queued error codes
    #[serde(skip)]
    faults: BTreeMap<String, VecDeque<String>>,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:06x}", prefix, self.next_id)
    }

    fn take_fault(&mut self, operation: &str) -> Option<CloudError> {
        let queue = self.faults.get_mut(operation)?;
        let code = queue.pop_front()?;
        tracing::debug!("Injecting {} into {}", code, operation);
        Some(classify(&code, "injected fault", &[]))
    }

    fn rest_api(&mut self, rest_api_id: &str) -> Result<&mut RestApi> {
        self.rest_apis.get_mut(rest_api_id).ok_or_else(|| {
            api_error(
                "NotFoundException",
                format!("Invalid API identifier specified {}", rest_api_id),
            )
        })
    }

    fn stage(&mut self, rest_api_id: &str, stage_name: &str) -> Result<&mut Stage> {
        self.rest_api(rest_api_id)?
            .stages
            .get_mut(stage_name)
            .ok_or_else(|| {
                api_error(
                    "NotFoundException",
                    format!("Invalid Stage identifier specified {}", stage_name),
                )
            })
    }

    fn glue_database(
        &mut self,
        catalog_id: &str,
        database_name: &str,
    ) -> Result<&mut BTreeMap<String, UserDefinedFunction>> {
        self.glue_catalogs
            .get_mut(catalog_id)
            .and_then(|c| c.get_mut(database_name))
            .ok_or_else(|| {
                glue_error(
                    "EntityNotFoundException",
                    format!("Database {} not found", database_name),
                )
            })
    }

    fn application(&mut self, application_id: &str) -> Result<&mut Application> {
        self.applications.get_mut(application_id).ok_or_else(|| {
            appconfig_error(
                "ResourceNotFoundException",
                format!("Application {} not found", application_id),
            )
        })
    }

    fn iam_user(&mut self, user_name: &str) -> Result<&mut BTreeSet<String>> {
        self.iam_users.get_mut(user_name).ok_or_else(|| {
            iam_error(
                "NoSuchEntity",
                format!("The user with name {} cannot be found.", user_name),
            )
        })
    }
}

fn api_error(code: &str, message: impl Into<String>) -> CloudError {
    classify(code, message, apigateway::NOT_FOUND_CODES)
}

fn glue_error(code: &str, message: impl Into<String>) -> CloudError {
    classify(code, message, glue::NOT_FOUND_CODES)
}

fn iam_error(code: &str, message: impl Into<String>) -> CloudError {
    classify(code, message, iam::NOT_FOUND_CODES)
}

fn appconfig_error(code: &str, message: impl Into<String>) -> CloudError {
    classify(code, message, appconfig::NOT_FOUND_CODES)
}

fn kafkaconnect_error(code: &str, message: impl Into<String>) -> CloudError {
    classify(code, message, kafkaconnect::NOT_FOUND_CODES)
}

fn validate_cache_size(size: Decimal) -> Result<Decimal> {
    let normalized = size.normalize();
    if CACHE_CLUSTER_SIZES.contains(&normalized.to_string().as_str()) {
        Ok(size)
    } else {
        Err(api_error(
            "BadRequestException",
            format!("Invalid cache cluster size {}", size),
        ))
    }
}

fn validate_percent_traffic(percent: Decimal) -> Result<Decimal> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(api_error(
            "BadRequestException",
            format!("Canary percent traffic {} must be between 0 and 100", percent),
        ));
    }
    Ok(percent)
}

fn parse_decimal(path: &str, value: &str) -> Result<Decimal> {
    value.parse::<Decimal>().map_err(|_| {
        api_error(
            "BadRequestException",
            format!("Invalid value {:?} for {}", value, path),
        )
    })
}

fn parse_bool(path: &str, value: &str) -> Result<bool> {
    value.parse::<bool>().map_err(|_| {
        api_error(
            "BadRequestException",
            format!("Invalid boolean {:?} for {}", value, path),
        )
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Apply one `UpdateStage` patch operation
fn apply_patch(
    stage: &mut Stage,
    deployments: &BTreeSet<String>,
    op: &PatchOperation,
) -> Result<()> {
    let path = op.path.as_str();
    let value = op.value.clone().unwrap_or_default();
    let replace = op.op == PatchOp::Replace;

    match path {
        "/deploymentId" if replace => {
            if !deployments.contains(&value) {
                return Err(api_error(
                    "BadRequestException",
                    format!("Invalid deployment identifier specified {}", value),
                ));
            }
            stage.deployment_id = Some(value);
        }
        "/description" => stage.description = non_empty(replace.then_some(value)),
        "/documentationVersion" => {
            stage.documentation_version = non_empty(replace.then_some(value))
        }
        "/clientCertificateId" => stage.client_certificate_id = non_empty(replace.then_some(value)),
        "/cacheClusterEnabled" if replace => {
            stage.cache_cluster_enabled = parse_bool(path, &value)?;
            if stage.cache_cluster_enabled && stage.cache_cluster_size.is_none() {
                stage.cache_cluster_size = DEFAULT_CACHE_CLUSTER_SIZE.parse().ok();
            }
        }
        "/cacheClusterSize" => {
            stage.cache_cluster_size = if replace {
                Some(validate_cache_size(parse_decimal(path, &value)?)?)
            } else {
                None
            };
        }
        "/tracingEnabled" if replace => stage.tracing_enabled = parse_bool(path, &value)?,
        "/accessLogSettings" if !replace => stage.access_log_settings = None,
        "/accessLogSettings/destinationArn" if replace => {
            stage
                .access_log_settings
                .get_or_insert_with(AccessLogSettings::default)
                .destination_arn = value;
        }
        "/accessLogSettings/format" if replace => {
            stage
                .access_log_settings
                .get_or_insert_with(AccessLogSettings::default)
                .format = value;
        }
        "/canarySettings" if !replace => stage.canary_settings = None,
        "/canarySettings/percentTraffic" if replace => {
            let percent = validate_percent_traffic(parse_decimal(path, &value)?)?;
            stage
                .canary_settings
                .get_or_insert_with(CanarySettings::default)
                .percent_traffic = Some(percent);
        }
        "/canarySettings/useStageCache" if replace => {
            stage
                .canary_settings
                .get_or_insert_with(CanarySettings::default)
                .use_stage_cache = parse_bool(path, &value)?;
        }
        "/canarySettings/deploymentId" if replace => {
            stage
                .canary_settings
                .get_or_insert_with(CanarySettings::default)
                .deployment_id = Some(value);
        }
        _ => {
            if let Some(key) = path.strip_prefix("/variables/") {
                if replace {
                    stage.variables.insert(key.to_string(), value);
                } else {
                    stage.variables.remove(key);
                }
            } else if let Some(key) = path.strip_prefix("/canarySettings/stageVariableOverrides/") {
                let canary = stage
                    .canary_settings
                    .get_or_insert_with(CanarySettings::default);
                if replace {
                    canary.stage_variable_overrides.insert(key.to_string(), value);
                } else {
                    canary.stage_variable_overrides.remove(key);
                }
            } else {
                return Err(api_error(
                    "BadRequestException",
                    format!("Invalid patch path {} for op {:?}", path, op.op),
                ));
            }
        }
    }

    Ok(())
}

/// `(rest_api_id, stage_name)` from a stage ARN
fn parse_stage_arn(arn: &str) -> Result<(String, String)> {
    let invalid = || api_error("NotFoundException", format!("Invalid resource ARN {}", arn));
    let path = arn
        .split_once("/restapis/")
        .map(|(_, rest)| rest)
        .ok_or_else(invalid)?;
    let (api, stage) = path.split_once("/stages/").ok_or_else(invalid)?;
    if api.is_empty() || stage.is_empty() {
        return Err(invalid());
    }
    Ok((api.to_string(), stage.to_string()))
}

/// In-memory implementation of every AWS service trait
pub struct MemoryCloud {
    account: AccountContext,
    retry: RetryConfig,
    activation_polls: u32,
    inner: Mutex<Inner>,
}

impl MemoryCloud {
    pub fn new(account: AccountContext) -> Self {
        Self {
            account,
            retry: RetryConfig::default(),
            activation_polls: 1,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Number of describe calls a new custom plugin stays in `CREATING`
    pub fn with_activation_polls(mut self, polls: u32) -> Self {
        self.activation_polls = polls;
        self
    }

    pub fn account(&self) -> &AccountContext {
        &self.account
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one API operation under the transport retry policy
    async fn call<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        F: Fn(&mut Inner) -> Result<T> + Send + Sync,
        T: Send,
    {
        let f = &f;
        with_retry(&self.retry, operation, move || async move {
            let mut inner = self.lock();
            match inner.take_fault(operation) {
                Some(fault) => Err(fault),
                None => f(&mut inner),
            }
        })
        .await
    }

    /// Fail the next `times` calls of `operation` with `error_code`
    pub fn inject_fault(&self, operation: &str, error_code: &str, times: usize) {
        let mut inner = self.lock();
        let queue = inner.faults.entry(operation.to_string()).or_default();
        queue.extend((0..times).map(|_| error_code.to_string()));
    }

    /// Load a persisted sandbox; a missing file yields an empty one
    pub async fn load(account: AccountContext, path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let cloud = Self::new(account);
        if !path.exists() {
            tracing::debug!("No sandbox file at {}, starting empty", path.display());
            return Ok(cloud);
        }

        let content = tokio::fs::read_to_string(path).await?;
        let inner: Inner = serde_json::from_str(&content)
            .map_err(|e| AwsError::Sandbox(format!("{}: {}", path.display(), e)))?;
        *cloud.lock() = inner;
        tracing::debug!("Loaded sandbox from {}", path.display());
        Ok(cloud)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&*self.lock())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    // Fixtures for parent objects the reconcilers do not manage

    /// Create a REST API with one deployment; returns `(rest_api_id, deployment_id)`
    pub fn create_rest_api(&self, name: &str) -> (String, String) {
        let mut inner = self.lock();
        let api_id = inner.next_id("api");
        let deployment_id = inner.next_id("dep");
        let mut api = RestApi {
            name: name.to_string(),
            ..Default::default()
        };
        api.deployments.insert(deployment_id.clone());
        inner.rest_apis.insert(api_id.clone(), api);
        (api_id, deployment_id)
    }

    pub fn create_deployment(&self, rest_api_id: &str) -> Result<String> {
        let mut inner = self.lock();
        let deployment_id = inner.next_id("dep");
        inner
            .rest_api(rest_api_id)?
            .deployments
            .insert(deployment_id.clone());
        Ok(deployment_id)
    }

    /// Delete a REST API together with its stages
    pub fn delete_rest_api(&self, rest_api_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.rest_api(rest_api_id)?;
        inner.rest_apis.remove(rest_api_id);
        Ok(())
    }

    pub fn create_glue_database(&self, catalog_id: &str, database_name: &str) {
        self.lock()
            .glue_catalogs
            .entry(catalog_id.to_string())
            .or_default()
            .entry(database_name.to_string())
            .or_default();
    }

    pub fn create_iam_user(&self, user_name: &str) {
        self.lock().iam_users.entry(user_name.to_string()).or_default();
    }

    /// Create a customer managed policy; returns its ARN
    pub fn create_iam_policy(&self, policy_name: &str) -> String {
        let arn = self
            .account
            .global_arn("iam", &format!("policy/{}", policy_name));
        self.lock()
            .iam_policies
            .insert(arn.clone(), policy_name.to_string());
        arn
    }

    /// Create an AppConfig application; returns its id
    pub fn create_appconfig_application(&self, name: &str) -> String {
        let mut inner = self.lock();
        let id = inner.next_id("app");
        inner.applications.insert(
            id.clone(),
            Application {
                name: name.to_string(),
                ..Default::default()
            },
        );
        id
    }
}

#[async_trait]
impl AccountApi for MemoryCloud {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        self.call("GetCallerIdentity", |_| {
            Ok(CallerIdentity {
                account: self.account.account_id.clone(),
                arn: self.account.global_arn("iam", "user/sandbox"),
            })
        })
        .await
    }
}

#[async_trait]
impl ApiGatewayApi for MemoryCloud {
    async fn get_stage(&self, rest_api_id: &str, stage_name: &str) -> Result<Stage> {
        self.call("GetStage", |inner| {
            inner.stage(rest_api_id, stage_name).map(|s| s.clone())
        })
        .await
    }

    async fn create_stage(&self, request: CreateStageRequest) -> Result<Stage> {
        self.call("CreateStage", |inner| {
            let api = inner.rest_api(&request.rest_api_id)?;
            if api.stages.contains_key(&request.stage_name) {
                return Err(api_error(
                    "ConflictException",
                    format!("Stage already exists {}", request.stage_name),
                ));
            }
            if !api.deployments.contains(&request.deployment_id) {
                return Err(api_error(
                    "BadRequestException",
                    format!("Invalid deployment identifier specified {}", request.deployment_id),
                ));
            }

            let mut cache_cluster_size = request
                .cache_cluster_size
                .map(validate_cache_size)
                .transpose()?;
            if request.cache_cluster_enabled && cache_cluster_size.is_none() {
                cache_cluster_size = DEFAULT_CACHE_CLUSTER_SIZE.parse().ok();
            }
            let percent_traffic = request
                .canary_settings
                .as_ref()
                .and_then(|c| c.percent_traffic);
            if let Some(percent) = percent_traffic {
                validate_percent_traffic(percent)?;
            }

            let stage = Stage {
                rest_api_id: request.rest_api_id.clone(),
                stage_name: request.stage_name.clone(),
                deployment_id: Some(request.deployment_id.clone()),
                description: non_empty(request.description.clone()),
                documentation_version: non_empty(request.documentation_version.clone()),
                variables: request.variables.clone(),
                cache_cluster_enabled: request.cache_cluster_enabled,
                cache_cluster_size,
                client_certificate_id: None,
                tracing_enabled: request.tracing_enabled,
                access_log_settings: None,
                canary_settings: request.canary_settings.clone(),
                tags: request.tags.clone(),
                web_acl_arn: None,
            };
            api.stages.insert(request.stage_name.clone(), stage.clone());
            Ok(stage)
        })
        .await
    }

    async fn update_stage(
        &self,
        rest_api_id: &str,
        stage_name: &str,
        patch: Vec<PatchOperation>,
    ) -> Result<Stage> {
        self.call("UpdateStage", |inner| {
            let api = inner.rest_api(rest_api_id)?;
            let current = api.stages.get(stage_name).ok_or_else(|| {
                api_error(
                    "NotFoundException",
                    format!("Invalid Stage identifier specified {}", stage_name),
                )
            })?;

            // All operations apply or none do
            let mut stage = current.clone();
            for op in &patch {
                apply_patch(&mut stage, &api.deployments, op)?;
            }
            api.stages.insert(stage_name.to_string(), stage.clone());
            Ok(stage)
        })
        .await
    }

    async fn delete_stage(&self, rest_api_id: &str, stage_name: &str) -> Result<()> {
        self.call("DeleteStage", |inner| {
            inner.stage(rest_api_id, stage_name)?;
            inner.rest_api(rest_api_id)?.stages.remove(stage_name);
            Ok(())
        })
        .await
    }

    async fn tag_resource(&self, resource_arn: &str, tags: BTreeMap<String, String>) -> Result<()> {
        let (api, stage) = parse_stage_arn(resource_arn)?;
        self.call("TagResource", |inner| {
            inner.stage(&api, &stage)?.tags.extend(tags.clone());
            Ok(())
        })
        .await
    }

    async fn untag_resource(&self, resource_arn: &str, tag_keys: Vec<String>) -> Result<()> {
        let (api, stage) = parse_stage_arn(resource_arn)?;
        self.call("UntagResource", |inner| {
            let stage = inner.stage(&api, &stage)?;
            for key in &tag_keys {
                stage.tags.remove(key);
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl GlueApi for MemoryCloud {
    async fn get_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
    ) -> Result<UserDefinedFunction> {
        self.call("GetUserDefinedFunction", |inner| {
            inner
                .glue_database(catalog_id, database_name)?
                .get(function_name)
                .cloned()
                .ok_or_else(|| {
                    glue_error(
                        "EntityNotFoundException",
                        format!("Function {} not found", function_name),
                    )
                })
        })
        .await
    }

    async fn create_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        input: UserDefinedFunctionInput,
    ) -> Result<()> {
        self.call("CreateUserDefinedFunction", |inner| {
            let database = inner.glue_database(catalog_id, database_name)?;
            if database.contains_key(&input.function_name) {
                return Err(glue_error(
                    "AlreadyExistsException",
                    format!("Function {} already exists", input.function_name),
                ));
            }
            database.insert(
                input.function_name.clone(),
                UserDefinedFunction {
                    catalog_id: catalog_id.to_string(),
                    database_name: database_name.to_string(),
                    function_name: input.function_name.clone(),
                    class_name: input.class_name.clone(),
                    owner_name: input.owner_name.clone(),
                    owner_type: input.owner_type,
                    resource_uris: input.resource_uris.clone(),
                    create_time: Some(chrono::Utc::now()),
                },
            );
            Ok(())
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
        self.call("UpdateUserDefinedFunction", |inner| {
            let database = inner.glue_database(catalog_id, database_name)?;
            let mut function = database.remove(function_name).ok_or_else(|| {
                glue_error(
                    "EntityNotFoundException",
                    format!("Function {} not found", function_name),
                )
            })?;
            function.function_name = input.function_name.clone();
            function.class_name = input.class_name.clone();
            function.owner_name = input.owner_name.clone();
            function.owner_type = input.owner_type;
            function.resource_uris = input.resource_uris.clone();
            database.insert(function.function_name.clone(), function);
            Ok(())
        })
        .await
    }

    async fn delete_user_defined_function(
        &self,
        catalog_id: &str,
        database_name: &str,
        function_name: &str,
    ) -> Result<()> {
        self.call("DeleteUserDefinedFunction", |inner| {
            inner
                .glue_database(catalog_id, database_name)?
                .remove(function_name)
                .map(|_| ())
                .ok_or_else(|| {
                    glue_error(
                        "EntityNotFoundException",
                        format!("Function {} not found", function_name),
                    )
                })
        })
        .await
    }
}

#[async_trait]
impl IamApi for MemoryCloud {
    async fn list_attached_user_policies(&self, user_name: &str) -> Result<Vec<AttachedPolicy>> {
        self.call("ListAttachedUserPolicies", |inner| {
            Ok(inner
                .iam_user(user_name)?
                .iter()
                .map(|arn| AttachedPolicy {
                    policy_name: arn.rsplit('/').next().unwrap_or(arn).to_string(),
                    policy_arn: arn.clone(),
                })
                .collect())
        })
        .await
    }

    async fn attach_user_policy(&self, user_name: &str, policy_arn: &str) -> Result<()> {
        self.call("AttachUserPolicy", |inner| {
            // AWS managed policies always exist
            let aws_managed = policy_arn.contains(":iam::aws:policy/");
            if !aws_managed && !inner.iam_policies.contains_key(policy_arn) {
                return Err(iam_error(
                    "NoSuchEntity",
                    format!("Policy {} does not exist or is not attachable.", policy_arn),
                ));
            }
            inner.iam_user(user_name)?.insert(policy_arn.to_string());
            Ok(())
        })
        .await
    }

    async fn detach_user_policy(&self, user_name: &str, policy_arn: &str) -> Result<()> {
        self.call("DetachUserPolicy", |inner| {
            if inner.iam_user(user_name)?.remove(policy_arn) {
                Ok(())
            } else {
                Err(iam_error(
                    "NoSuchEntity",
                    format!("Policy {} was not found.", policy_arn),
                ))
            }
        })
        .await
    }
}

#[async_trait]
impl AppConfigApi for MemoryCloud {
    async fn get_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
    ) -> Result<ConfigurationProfile> {
        self.call("GetConfigurationProfile", |inner| {
            inner
                .application(application_id)?
                .profiles
                .get(profile_id)
                .cloned()
                .ok_or_else(|| {
                    appconfig_error(
                        "ResourceNotFoundException",
                        format!("Configuration profile {} not found", profile_id),
                    )
                })
        })
        .await
    }

    async fn create_configuration_profile(
        &self,
        request: CreateConfigurationProfileRequest,
    ) -> Result<ConfigurationProfile> {
        self.call("CreateConfigurationProfile", |inner| {
            if request.name.is_empty() || request.name.len() > 128 {
                return Err(appconfig_error(
                    "BadRequestException",
                    "Name must be between 1 and 128 characters",
                ));
            }
            if request.validators.len() > 2 {
                return Err(appconfig_error(
                    "BadRequestException",
                    "At most 2 validators are allowed",
                ));
            }
            inner.application(&request.application_id)?;

            let id = inner.next_id("prf");
            let profile = ConfigurationProfile {
                application_id: request.application_id.clone(),
                id: id.clone(),
                name: request.name.clone(),
                description: non_empty(request.description.clone()),
                location_uri: request.location_uri.clone(),
                retrieval_role_arn: non_empty(request.retrieval_role_arn.clone()),
                validators: request.validators.clone(),
                profile_type: request.profile_type,
            };
            inner
                .application(&request.application_id)?
                .profiles
                .insert(id, profile.clone());
            Ok(profile)
        })
        .await
    }

    async fn update_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
        request: UpdateConfigurationProfileRequest,
    ) -> Result<ConfigurationProfile> {
        self.call("UpdateConfigurationProfile", |inner| {
            let profile = inner
                .application(application_id)?
                .profiles
                .get_mut(profile_id)
                .ok_or_else(|| {
                    appconfig_error(
                        "ResourceNotFoundException",
                        format!("Configuration profile {} not found", profile_id),
                    )
                })?;

            if let Some(name) = &request.name {
                profile.name = name.clone();
            }
            if let Some(description) = &request.description {
                profile.description = non_empty(Some(description.clone()));
            }
            if let Some(role) = &request.retrieval_role_arn {
                profile.retrieval_role_arn = non_empty(Some(role.clone()));
            }
            if let Some(validators) = &request.validators {
                profile.validators = validators.clone();
            }
            Ok(profile.clone())
        })
        .await
    }

    async fn delete_configuration_profile(
        &self,
        application_id: &str,
        profile_id: &str,
    ) -> Result<()> {
        self.call("DeleteConfigurationProfile", |inner| {
            inner
                .application(application_id)?
                .profiles
                .remove(profile_id)
                .map(|_| ())
                .ok_or_else(|| {
                    appconfig_error(
                        "ResourceNotFoundException",
                        format!("Configuration profile {} not found", profile_id),
                    )
                })
        })
        .await
    }

    async fn list_configuration_profiles(
        &self,
        application_id: &str,
    ) -> Result<Vec<ConfigurationProfileSummary>> {
        self.call("ListConfigurationProfiles", |inner| {
            Ok(inner
                .application(application_id)?
                .profiles
                .values()
                .map(|p| ConfigurationProfileSummary {
                    application_id: p.application_id.clone(),
                    id: p.id.clone(),
                    name: p.name.clone(),
                    location_uri: p.location_uri.clone(),
                    profile_type: p.profile_type,
                })
                .collect())
        })
        .await
    }
}

#[async_trait]
impl KafkaConnectApi for MemoryCloud {
    async fn describe_custom_plugin(&self, arn: &str) -> Result<CustomPlugin> {
        self.call("DescribeCustomPlugin", |inner| {
            let entry = inner.custom_plugins.get_mut(arn).ok_or_else(|| {
                kafkaconnect_error(
                    "NotFoundException",
                    format!("Custom plugin {} not found", arn),
                )
            })?;

            let state = entry.plugin.state;
            match state {
                CustomPluginState::Creating if entry.polls_until_active == 0 => {
                    entry.plugin.state = CustomPluginState::Active;
                }
                CustomPluginState::Creating => entry.polls_until_active -= 1,
                CustomPluginState::Deleting => {
                    // Reported once, then gone
                    let plugin = entry.plugin.clone();
                    inner.custom_plugins.remove(arn);
                    return Ok(plugin);
                }
                _ => {}
            }
            Ok(entry.plugin.clone())
        })
        .await
    }

    async fn create_custom_plugin(&self, request: CreateCustomPluginRequest) -> Result<String> {
        self.call("CreateCustomPlugin", |inner| {
            if inner
                .custom_plugins
                .values()
                .any(|e| e.plugin.name == request.name)
            {
                return Err(kafkaconnect_error(
                    "ConflictException",
                    format!("Custom plugin {} already exists", request.name),
                ));
            }
            if !request.location.s3.bucket_arn.starts_with("arn:") {
                return Err(kafkaconnect_error(
                    "BadRequestException",
                    format!("Invalid bucket ARN {}", request.location.s3.bucket_arn),
                ));
            }

            let suffix = inner.next_id("");
            let arn = self
                .account
                .arn("kafkaconnect", &format!("custom-plugin/{}/{}", request.name, suffix));
            let plugin = CustomPlugin {
                arn: arn.clone(),
                name: request.name.clone(),
                description: non_empty(request.description.clone()),
                content_type: request.content_type,
                location: request.location.clone(),
                state: CustomPluginState::Creating,
                latest_revision: 1,
            };
            inner.custom_plugins.insert(
                arn.clone(),
                PluginEntry {
                    plugin,
                    polls_until_active: self.activation_polls,
                },
            );
            Ok(arn)
        })
        .await
    }

    async fn delete_custom_plugin(&self, arn: &str) -> Result<()> {
        self.call("DeleteCustomPlugin", |inner| {
            let entry = inner.custom_plugins.get_mut(arn).ok_or_else(|| {
                kafkaconnect_error(
                    "NotFoundException",
                    format!("Custom plugin {} not found", arn),
                )
            })?;
            entry.plugin.state = CustomPluginState::Deleting;
            Ok(())
        })
        .await
    }

    async fn list_custom_plugins(&self) -> Result<Vec<CustomPluginSummary>> {
        self.call("ListCustomPlugins", |inner| {
            Ok(inner
                .custom_plugins
                .values()
                .map(|e| CustomPluginSummary {
                    arn: e.plugin.arn.clone(),
                    name: e.plugin.name.clone(),
                    state: e.plugin.state,
                })
                .collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strata_cloud::ErrorKind;
    use tempfile::tempdir;

    fn cloud() -> MemoryCloud {
        MemoryCloud::new(AccountContext::new("aws", "us-east-1", "123456789012")).with_retry(
            RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
            },
        )
    }

    fn stage_request(api: &str, deployment: &str) -> CreateStageRequest {
        CreateStageRequest {
            rest_api_id: api.into(),
            stage_name: "prod".into(),
            deployment_id: deployment.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stage_requires_parent_and_deployment() {
        let cloud = cloud();
        let err = cloud.create_stage(stage_request("missing", "d")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let (api, _) = cloud.create_rest_api("orders");
        let err = cloud.create_stage(stage_request(&api, "nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_duplicate_stage_conflicts() {
        let cloud = cloud();
        let (api, deployment) = cloud.create_rest_api("orders");
        cloud.create_stage(stage_request(&api, &deployment)).await.unwrap();
        let err = cloud
            .create_stage(stage_request(&api, &deployment))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_cache_size_rules() {
        let cloud = cloud();
        let (api, deployment) = cloud.create_rest_api("orders");
        let mut request = stage_request(&api, &deployment);
        request.cache_cluster_enabled = true;
        let stage = cloud.create_stage(request).await.unwrap();
        assert_eq!(stage.cache_cluster_size, Some("0.5".parse().unwrap()));

        let err = cloud
            .update_stage(&api, "prod", vec![PatchOperation::replace("/cacheClusterSize", "7")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        // Disabling the cache leaves the size alone
        let stage = cloud
            .update_stage(
                &api,
                "prod",
                vec![
                    PatchOperation::replace("/cacheClusterSize", "6.1"),
                    PatchOperation::replace("/cacheClusterEnabled", "false"),
                ],
            )
            .await
            .unwrap();
        assert!(!stage.cache_cluster_enabled);
        assert_eq!(stage.cache_cluster_size, Some("6.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_failed_patch_is_atomic() {
        let cloud = cloud();
        let (api, deployment) = cloud.create_rest_api("orders");
        cloud.create_stage(stage_request(&api, &deployment)).await.unwrap();

        let err = cloud
            .update_stage(
                &api,
                "prod",
                vec![
                    PatchOperation::replace("/description", "changed"),
                    PatchOperation::replace("/bogus", "x"),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(cloud.get_stage(&api, "prod").await.unwrap().description, None);
    }

    #[tokio::test]
    async fn test_stage_tags_by_arn() {
        let cloud = cloud();
        let (api, deployment) = cloud.create_rest_api("orders");
        cloud.create_stage(stage_request(&api, &deployment)).await.unwrap();
        let arn = cloud
            .account()
            .regional_arn("apigateway", &format!("/restapis/{}/stages/prod", api));

        let tags = BTreeMap::from([("team".to_string(), "payments".to_string())]);
        cloud.tag_resource(&arn, tags).await.unwrap();
        assert_eq!(cloud.get_stage(&api, "prod").await.unwrap().tags["team"], "payments");

        cloud.untag_resource(&arn, vec!["team".into()]).await.unwrap();
        assert!(cloud.get_stage(&api, "prod").await.unwrap().tags.is_empty());

        assert!(cloud.tag_resource("arn:aws:s3:::bucket", BTreeMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_transient_faults_are_retried() {
        let cloud = cloud();
        cloud.create_iam_user("test-user");
        cloud.inject_fault("ListAttachedUserPolicies", "ThrottlingException", 2);
        assert!(cloud.list_attached_user_policies("test-user").await.unwrap().is_empty());

        cloud.inject_fault("ListAttachedUserPolicies", "ThrottlingException", 3);
        let err = cloud.list_attached_user_policies("test-user").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_plugin_lifecycle() {
        let cloud = cloud().with_activation_polls(1);
        let arn = cloud
            .create_custom_plugin(CreateCustomPluginRequest {
                name: "debezium".into(),
                description: None,
                content_type: kafkaconnect::ContentType::Zip,
                location: kafkaconnect::CustomPluginLocation {
                    s3: kafkaconnect::S3Location {
                        bucket_arn: "arn:aws:s3:::plugins".into(),
                        file_key: "debezium.zip".into(),
                        object_version: None,
                    },
                },
            })
            .await
            .unwrap();

        assert_eq!(
            cloud.describe_custom_plugin(&arn).await.unwrap().state,
            CustomPluginState::Creating
        );
        assert_eq!(
            cloud.describe_custom_plugin(&arn).await.unwrap().state,
            CustomPluginState::Active
        );

        cloud.delete_custom_plugin(&arn).await.unwrap();
        assert_eq!(
            cloud.describe_custom_plugin(&arn).await.unwrap().state,
            CustomPluginState::Deleting
        );
        let err = cloud.describe_custom_plugin(&arn).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sandbox.json");

        let cloud = cloud();
        let (api, _) = cloud.create_rest_api("orders");
        cloud.create_iam_user("test-user");
        cloud.save(&path).await.unwrap();

        let loaded = MemoryCloud::load(cloud.account().clone(), &path).await.unwrap();
        assert!(loaded.create_deployment(&api).is_ok());
        assert!(loaded.list_attached_user_policies("test-user").await.is_ok());

        // Ids keep counting from where the saved sandbox left off
        let (second, _) = loaded.create_rest_api("billing");
        assert_ne!(second, api);
    }
}
