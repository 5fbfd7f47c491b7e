//! Account context and the combined service client trait

use crate::apigateway::ApiGatewayApi;
use crate::appconfig::AppConfigApi;
use crate::glue::GlueApi;
use crate::iam::IamApi;
use crate::kafkaconnect::KafkaConnectApi;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strata_cloud::{Result, RetryConfig, WaitConfig};
use strata_config::{RetrySettings, Settings, WaiterSettings};

/// Partition, region and account used to build ARNs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl AccountContext {
    pub fn new(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    /// `arn:{partition}:{service}:{region}:{account}:{resource}`
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition, service, self.region, self.account_id, resource
        )
    }

    /// ARN without an account part (API Gateway management resources)
    pub fn regional_arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}::{}",
            self.partition, service, self.region, resource
        )
    }

    /// ARN without a region part (IAM)
    pub fn global_arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}::{}:{}",
            self.partition, service, self.account_id, resource
        )
    }
}

impl From<&Settings> for AccountContext {
    fn from(settings: &Settings) -> Self {
        Self::new(&settings.partition, &settings.region, &settings.account_id)
    }
}

/// Transport retry policy from the `retry` settings block
pub fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig {
        max_attempts: settings.max_attempts,
        initial_delay: Duration::from_millis(settings.initial_delay_ms),
        max_delay: Duration::from_millis(settings.max_delay_ms),
        backoff_multiplier: settings.multiplier,
    }
}

pub fn wait_config(settings: &WaiterSettings) -> WaitConfig {
    WaitConfig {
        max_retries: settings.max_retries,
        initial_delay_ms: settings.initial_delay_ms,
        max_delay_ms: settings.max_delay_ms,
        multiplier: settings.multiplier,
    }
}

/// Identity of the authenticated principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity>;
}

/// Every service client the AWS reconcilers need
pub trait AwsApi:
    AccountApi + ApiGatewayApi + GlueApi + IamApi + AppConfigApi + KafkaConnectApi
{
}

impl<T> AwsApi for T where
    T: AccountApi + ApiGatewayApi + GlueApi + IamApi + AppConfigApi + KafkaConnectApi
{
}

/// Turn a not-found error into `None`
pub(crate) fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
