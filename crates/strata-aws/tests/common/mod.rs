use serde_json::Value;
use std::time::Duration;
use strata_aws::{AccountContext, AwsProvider, MemoryCloud};
use strata_cloud::{
    ApplyResult, CloudProvider, Plan, ProviderState, ResourceConfig, ResourceSet, RetryConfig,
};
use strata_config::{CacheSizePolicy, Settings, WaiterSettings};

#[allow(dead_code)]
pub const ACCOUNT_ID: &str = "123456789012";

pub fn settings(cache_size_policy: CacheSizePolicy) -> Settings {
    Settings {
        cache_size_policy,
        waiter: WaiterSettings {
            max_retries: 20,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 1.0,
        },
        ..Settings::default()
    }
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
    }
}

pub fn sandbox(settings: &Settings) -> MemoryCloud {
    MemoryCloud::new(AccountContext::from(settings)).with_retry(fast_retry())
}

#[allow(dead_code)]
/// Provider over a fresh sandbox with the default (retain) cache policy
pub fn provider() -> AwsProvider<MemoryCloud> {
    provider_with(CacheSizePolicy::Retain)
}

pub fn provider_with(policy: CacheSizePolicy) -> AwsProvider<MemoryCloud> {
    let settings = settings(policy);
    AwsProvider::new(sandbox(&settings), settings)
}

#[allow(dead_code)]
pub fn resources(items: Vec<(&str, &str, Value)>) -> ResourceSet {
    items
        .into_iter()
        .map(|(resource_type, name, config)| {
            ResourceConfig::new(resource_type, name, "aws", config)
        })
        .collect()
}

#[allow(dead_code)]
/// Plan and apply `desired`, failing the test on any failed action
pub async fn converge(
    provider: &AwsProvider<MemoryCloud>,
    desired: &ResourceSet,
    state: &mut ProviderState,
) -> Plan {
    let plan = provider.plan(desired, state).await.unwrap();
    let result = provider.apply(&plan, desired, state).await.unwrap();
    assert_success(&result);
    plan
}

#[allow(dead_code)]
pub fn assert_success(result: &ApplyResult) {
    assert!(result.is_success(), "apply failed: {:?}", result.failed);
}

/// Assert the next plan has nothing to do
#[allow(dead_code)]
pub async fn assert_converged(
    provider: &AwsProvider<MemoryCloud>,
    desired: &ResourceSet,
    state: &ProviderState,
) {
    let plan = provider.plan(desired, state).await.unwrap();
    assert!(!plan.has_changes, "unexpected changes: {}", plan.summary());
}
