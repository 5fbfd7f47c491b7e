mod common;

use common::*;
use serde_json::{Value, json};
use strata_aws::glue::{GlueApi, ResourceType};
use strata_cloud::{CloudProvider, ErrorKind, ProviderState};

const ADDRESS: &str = "aws_glue_user_defined_function:to_upper";

fn function(name: &str, extra: Value) -> Value {
    let mut config = json!({
        "database_name": "analytics",
        "name": name,
        "class_name": "com.example.udf.ToUpper",
        "owner_name": "data-eng",
        "owner_type": "GROUP",
    });
    if let (Some(config), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
        config.extend(extra.clone());
    }
    config
}

fn declare(config: Value) -> strata_cloud::ResourceSet {
    resources(vec![("aws_glue_user_defined_function", "to_upper", config)])
}

fn uri(kind: &str, uri: &str) -> Value {
    json!({"resource_type": kind, "uri": uri})
}

#[tokio::test]
async fn test_create_defaults_catalog_to_account() {
    let provider = provider();
    provider.client().create_glue_database(ACCOUNT_ID, "analytics");
    let desired = declare(function("to_upper", json!({})));
    let mut state = ProviderState::new();
    converge(&provider, &desired, &mut state).await;

    let recorded = state.get(ADDRESS).unwrap();
    assert_eq!(recorded.id, format!("{}/analytics/to_upper", ACCOUNT_ID));
    assert_eq!(
        recorded.attributes["arn"],
        "arn:aws:glue:us-east-1:123456789012:userDefinedFunction/analytics/to_upper"
    );
    assert_eq!(recorded.attributes["owner_type"], "GROUP");
    assert!(recorded.attributes["create_time"].is_string());

    assert_converged(&provider, &desired, &state).await;
}

#[tokio::test]
async fn test_resource_uris_update_in_place() {
    let provider = provider();
    provider.client().create_glue_database(ACCOUNT_ID, "analytics");
    let mut state = ProviderState::new();

    let steps = [
        json!([uri("ARCHIVE", "s3://udfs/archive.zip")]),
        json!([
            uri("ARCHIVE", "s3://udfs/archive.zip"),
            uri("JAR", "s3://udfs/to-upper.jar")
        ]),
        json!([uri("JAR", "s3://udfs/to-upper.jar")]),
    ];
    let mut created_at = None;
    for (i, uris) in steps.into_iter().enumerate() {
        let desired = declare(function("to_upper", json!({"resource_uris": uris})));
        let plan = converge(&provider, &desired, &mut state).await;
        if i > 0 {
            assert_eq!(plan.summary().update, 1, "step {}", i);
        }
        assert_converged(&provider, &desired, &state).await;

        let remote = provider
            .client()
            .get_user_defined_function(ACCOUNT_ID, "analytics", "to_upper")
            .await
            .unwrap();
        let created = created_at.get_or_insert(remote.create_time);
        assert_eq!(*created, remote.create_time, "updated in place");
        if i == 2 {
            assert_eq!(remote.resource_uris.len(), 1);
            assert_eq!(remote.resource_uris[0].resource_type, ResourceType::Jar);
        }
    }
}

#[tokio::test]
async fn test_class_and_owner_change_in_place() {
    let provider = provider();
    provider.client().create_glue_database(ACCOUNT_ID, "analytics");
    let mut state = ProviderState::new();
    converge(&provider, &declare(function("to_upper", json!({}))), &mut state).await;

    let desired = declare(function(
        "to_upper",
        json!({"class_name": "com.example.udf.Upper", "owner_name": "platform"}),
    ));
    let plan = converge(&provider, &desired, &mut state).await;
    assert_eq!(plan.summary().update, 1);

    let remote = provider
        .client()
        .get_user_defined_function(ACCOUNT_ID, "analytics", "to_upper")
        .await
        .unwrap();
    assert_eq!(remote.class_name, "com.example.udf.Upper");
    assert_eq!(remote.owner_name, "platform");
}

#[tokio::test]
async fn test_rename_forces_replacement() {
    let provider = provider();
    provider.client().create_glue_database(ACCOUNT_ID, "analytics");
    let mut state = ProviderState::new();
    converge(&provider, &declare(function("to_upper", json!({}))), &mut state).await;

    let plan = converge(&provider, &declare(function("upper", json!({}))), &mut state).await;
    assert_eq!(plan.summary().replace, 1);
    assert_eq!(state.get(ADDRESS).unwrap().id, format!("{}/analytics/upper", ACCOUNT_ID));

    let client = provider.client();
    let err = client
        .get_user_defined_function(ACCOUNT_ID, "analytics", "to_upper")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(
        client
            .get_user_defined_function(ACCOUNT_ID, "analytics", "upper")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_missing_database_fails_the_action() {
    let provider = provider();
    let desired = declare(function("to_upper", json!({})));
    let mut state = ProviderState::new();

    let plan = provider.plan(&desired, &state).await.unwrap();
    let result = provider.apply(&plan, &desired, &mut state).await.unwrap();
    assert_eq!(result.failed.len(), 1);
    assert!(state.is_empty());
}

#[tokio::test]
async fn test_import_and_destroy() {
    let provider = provider();
    provider.client().create_glue_database(ACCOUNT_ID, "analytics");
    let mut state = ProviderState::new();
    converge(&provider, &declare(function("to_upper", json!({}))), &mut state).await;

    let mut adopted = ProviderState::new();
    provider
        .import(
            "aws_glue_user_defined_function",
            "to_upper",
            &format!("{}/analytics/to_upper", ACCOUNT_ID),
            &mut adopted,
        )
        .await
        .unwrap();
    assert_eq!(
        adopted.get(ADDRESS).unwrap().attributes,
        state.get(ADDRESS).unwrap().attributes
    );

    let result = provider.destroy_all(&mut state).await.unwrap();
    assert_success(&result);
    assert!(state.is_empty());

    // The adopted copy points at the same function, which is already gone
    provider.destroy(ADDRESS, &mut adopted).await.unwrap();
    assert!(adopted.is_empty());
}
