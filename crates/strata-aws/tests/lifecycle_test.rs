mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use strata_aws::apigateway::ApiGatewayApi;
use strata_aws::kafkaconnect::KafkaConnectApi;
use strata_aws::{AccountContext, AwsProvider, MemoryCloud};
use strata_cloud::{
    CloudProvider, ErrorKind, GlobalState, ProviderState, ResourceStatus, StateManager,
};
use strata_config::{CacheSizePolicy, WaiterSettings};

fn plugin_config() -> serde_json::Value {
    json!({
        "name": "debezium",
        "content_type": "JAR",
        "location": {"s3": {"bucket_arn": "arn:aws:s3:::plugins", "file_key": "debezium.jar"}}
    })
}

#[tokio::test]
async fn test_cancelled_apply_cleans_up_created_resources() {
    // The plugin never activates within the test, the stage is created first
    let mut settings = settings(CacheSizePolicy::Retain);
    settings.waiter = WaiterSettings {
        max_retries: 10_000,
        initial_delay_ms: 10,
        max_delay_ms: 10,
        multiplier: 1.0,
    };
    let client = MemoryCloud::new(AccountContext::from(&settings))
        .with_retry(fast_retry())
        .with_activation_polls(u32::MAX);
    let provider = AwsProvider::new(client, settings);
    let (api, deployment) = provider.client().create_rest_api("orders");

    let desired = resources(vec![
        (
            "aws_api_gateway_stage",
            "prod",
            json!({"rest_api_id": api, "stage_name": "prod", "deployment_id": deployment}),
        ),
        ("aws_mskconnect_custom_plugin", "debezium", plugin_config()),
    ]);
    let mut state = ProviderState::new();
    let plan = provider.plan(&desired, &state).await.unwrap();
    assert_eq!(plan.summary().create, 2);

    let err = provider
        .apply_until(
            &plan,
            &desired,
            &mut state,
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(err.to_string().contains("debezium"));

    assert!(state.get("aws_api_gateway_stage:prod").is_none());
    let err = provider.client().get_stage(&api, "prod").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The plugin was still activating when the apply stopped
    let plugins = provider.client().list_custom_plugins().await.unwrap();
    assert!(plugins.is_empty(), "leaked plugins: {:?}", plugins);
}

fn logged_stage(api: &str, deployment: &str) -> serde_json::Value {
    json!({
        "rest_api_id": api,
        "stage_name": "prod",
        "deployment_id": deployment,
        "access_log_settings": {
            "destination_arn": "arn:aws:logs:us-east-1:123456789012:log-group:access",
            "format": "$context.requestId"
        }
    })
}

#[tokio::test]
async fn test_stage_that_fails_post_create_patch_is_removed() {
    let provider = provider();
    let (api, deployment) = provider.client().create_rest_api("orders");
    let desired = resources(vec![(
        "aws_api_gateway_stage",
        "prod",
        logged_stage(&api, &deployment),
    )]);
    let mut state = ProviderState::new();

    provider
        .client()
        .inject_fault("UpdateStage", "BadRequestException", 1);
    let plan = provider.plan(&desired, &state).await.unwrap();
    let result = provider.apply(&plan, &desired, &mut state).await.unwrap();
    assert_eq!(result.failed.len(), 1);
    assert!(state.is_empty());
    let err = provider.client().get_stage(&api, "prod").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // No name conflict on the next run
    converge(&provider, &desired, &mut state).await;
    let recorded = state.get("aws_api_gateway_stage:prod").unwrap();
    assert_eq!(recorded.status, ResourceStatus::Present);
    assert_eq!(
        recorded.attributes["access_log_settings"]["format"],
        "$context.requestId"
    );
}

#[tokio::test]
async fn test_stage_that_cannot_be_removed_is_repaired_next_run() {
    let provider = provider();
    let (api, deployment) = provider.client().create_rest_api("orders");
    let desired = resources(vec![(
        "aws_api_gateway_stage",
        "prod",
        logged_stage(&api, &deployment),
    )]);
    let mut state = ProviderState::new();

    provider
        .client()
        .inject_fault("UpdateStage", "BadRequestException", 1);
    provider
        .client()
        .inject_fault("DeleteStage", "ConflictException", 1);
    let plan = provider.plan(&desired, &state).await.unwrap();
    let result = provider.apply(&plan, &desired, &mut state).await.unwrap();
    assert_eq!(result.failed.len(), 1);

    let recorded = state.get("aws_api_gateway_stage:prod").unwrap();
    assert_eq!(recorded.status, ResourceStatus::Error);
    assert_eq!(recorded.id, format!("{}/prod", api));

    let plan = converge(&provider, &desired, &mut state).await;
    assert_eq!(plan.summary().create, 0);
    assert_eq!(plan.summary().update, 1);
    assert_eq!(
        state.get("aws_api_gateway_stage:prod").unwrap().status,
        ResourceStatus::Present
    );
    assert_converged(&provider, &desired, &state).await;
}

#[tokio::test]
async fn test_transient_faults_are_retried() {
    let provider = provider();
    let (api, deployment) = provider.client().create_rest_api("orders");
    let desired = resources(vec![(
        "aws_api_gateway_stage",
        "prod",
        json!({"rest_api_id": api, "stage_name": "prod", "deployment_id": deployment}),
    )]);
    let mut state = ProviderState::new();

    // Two failures fit inside three attempts
    provider
        .client()
        .inject_fault("CreateStage", "TooManyRequestsException", 2);
    converge(&provider, &desired, &mut state).await;
    assert_eq!(
        state.get("aws_api_gateway_stage:prod").unwrap().status,
        ResourceStatus::Present
    );
}

#[tokio::test]
async fn test_exhausted_retries_mark_resource_error() {
    let provider = provider();
    let (api, deployment) = provider.client().create_rest_api("orders");
    let mut state = ProviderState::new();
    converge(
        &provider,
        &resources(vec![(
            "aws_api_gateway_stage",
            "prod",
            json!({"rest_api_id": api, "stage_name": "prod", "deployment_id": deployment}),
        )]),
        &mut state,
    )
    .await;

    let desired = resources(vec![(
        "aws_api_gateway_stage",
        "prod",
        json!({
            "rest_api_id": api,
            "stage_name": "prod",
            "deployment_id": deployment,
            "description": "throttled"
        }),
    )]);
    provider
        .client()
        .inject_fault("UpdateStage", "ThrottlingException", 5);
    let plan = provider.plan(&desired, &state).await.unwrap();
    let result = provider.apply(&plan, &desired, &mut state).await.unwrap();

    assert_eq!(result.failed.len(), 1);
    assert!(
        result.failed[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("ThrottlingException"))
    );
    assert_eq!(
        state.get("aws_api_gateway_stage:prod").unwrap().status,
        ResourceStatus::Error
    );

    // Faults drained, the next run converges
    converge(&provider, &desired, &mut state).await;
    assert_eq!(
        state.get("aws_api_gateway_stage:prod").unwrap().status,
        ResourceStatus::Present
    );
}

#[tokio::test]
async fn test_sandbox_and_state_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox_path = dir.path().join(".strata/sandbox.json");
    let settings = settings(CacheSizePolicy::Retain);

    let provider = provider();
    let (api, deployment) = provider.client().create_rest_api("orders");
    provider.client().create_iam_user("deployer");
    let desired = resources(vec![
        (
            "aws_api_gateway_stage",
            "prod",
            json!({
                "rest_api_id": api,
                "stage_name": "prod",
                "deployment_id": deployment,
                "tags": {"team": "orders"}
            }),
        ),
        (
            "aws_iam_user_policy_attachment",
            "deployer",
            json!({
                "user": "deployer",
                "policy_arn": "arn:aws:iam::aws:policy/AWSCodeDeployFullAccess"
            }),
        ),
    ]);
    let mut state = ProviderState::new();
    converge(&provider, &desired, &mut state).await;

    provider.client().save(&sandbox_path).await.unwrap();
    let manager = StateManager::new(dir.path());
    let mut global = GlobalState::new();
    global.set_provider_state("aws", &state);
    manager.save(&global).await.unwrap();

    let restored = MemoryCloud::load(AccountContext::from(&settings), &sandbox_path)
        .await
        .unwrap()
        .with_retry(fast_retry());
    let provider = AwsProvider::new(restored, settings);
    let state = manager.load().await.unwrap().provider_state("aws");
    assert_eq!(state.len(), 2);

    let plan = provider.plan(&desired, &state).await.unwrap();
    assert!(!plan.has_changes, "unexpected changes: {}", plan.summary());
}

#[tokio::test]
async fn test_missing_sandbox_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(CacheSizePolicy::Retain);
    let cloud = MemoryCloud::load(AccountContext::from(&settings), dir.path().join("none.json"))
        .await
        .unwrap();
    let provider = AwsProvider::new(cloud, settings);

    let status = provider.check_auth().await.unwrap();
    assert!(status.authenticated);
}
