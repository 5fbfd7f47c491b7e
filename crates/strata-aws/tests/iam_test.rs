mod common;

use common::*;
use serde_json::json;
use strata_aws::iam::IamApi;
use strata_cloud::{CloudProvider, DriftKind, ErrorKind, ProviderState};

const READ_ONLY: &str = "arn:aws:iam::aws:policy/ReadOnlyAccess";
const POWER_USER: &str = "arn:aws:iam::aws:policy/PowerUserAccess";

async fn attached(provider: &strata_aws::AwsProvider<strata_aws::MemoryCloud>) -> Vec<String> {
    let mut arns: Vec<String> = provider
        .client()
        .list_attached_user_policies("test-user")
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.policy_arn)
        .collect();
    arns.sort();
    arns
}

#[tokio::test]
async fn test_policy_change_replaces_attachment() {
    let provider = provider();
    provider.client().create_iam_user("test-user");
    let team = provider.client().create_iam_policy("team/deploy");
    let mut state = ProviderState::new();

    let desired = resources(vec![
        (
            "aws_iam_user_policy_attachment",
            "read",
            json!({"user": "test-user", "policy_arn": READ_ONLY}),
        ),
        (
            "aws_iam_user_policy_attachment",
            "team",
            json!({"user": "test-user", "policy_arn": team}),
        ),
    ]);
    converge(&provider, &desired, &mut state).await;
    assert_eq!(attached(&provider).await.len(), 2);
    assert_eq!(
        state.get("aws_iam_user_policy_attachment:team").unwrap().id,
        format!("test-user/{}", team)
    );

    let desired = resources(vec![
        (
            "aws_iam_user_policy_attachment",
            "read",
            json!({"user": "test-user", "policy_arn": POWER_USER}),
        ),
        (
            "aws_iam_user_policy_attachment",
            "team",
            json!({"user": "test-user", "policy_arn": team}),
        ),
    ]);
    let plan = converge(&provider, &desired, &mut state).await;
    assert_eq!(plan.summary().replace, 1);
    assert_eq!(plan.summary().no_change, 1);

    let mut expected = vec![POWER_USER.to_string(), team.clone()];
    expected.sort();
    assert_eq!(attached(&provider).await, expected);
    assert_converged(&provider, &desired, &state).await;
}

#[tokio::test]
async fn test_one_attachment_becomes_two() {
    let provider = provider();
    provider.client().create_iam_user("test-user");
    let first = provider.client().create_iam_policy("test-policy");
    let second = provider.client().create_iam_policy("test-policy2");
    let third = provider.client().create_iam_policy("test-policy3");
    let mut state = ProviderState::new();

    let desired = resources(vec![(
        "aws_iam_user_policy_attachment",
        "test-attach",
        json!({"user": "test-user", "policy_arn": first}),
    )]);
    converge(&provider, &desired, &mut state).await;
    assert_eq!(attached(&provider).await, vec![first.clone()]);

    let desired = resources(vec![
        (
            "aws_iam_user_policy_attachment",
            "test-attach",
            json!({"user": "test-user", "policy_arn": second}),
        ),
        (
            "aws_iam_user_policy_attachment",
            "test-attach2",
            json!({"user": "test-user", "policy_arn": third}),
        ),
    ]);
    let plan = converge(&provider, &desired, &mut state).await;
    assert_eq!(plan.summary().replace, 1);
    assert_eq!(plan.summary().create, 1);

    let mut expected = vec![second, third];
    expected.sort();
    assert_eq!(attached(&provider).await, expected);
    assert_eq!(state.len(), 2);
    assert_converged(&provider, &desired, &state).await;
}

#[tokio::test]
async fn test_unknown_policy_is_not_attached() {
    let provider = provider();
    provider.client().create_iam_user("test-user");
    let desired = resources(vec![(
        "aws_iam_user_policy_attachment",
        "missing",
        json!({
            "user": "test-user",
            "policy_arn": "arn:aws:iam::123456789012:policy/does-not-exist"
        }),
    )]);
    let mut state = ProviderState::new();

    let plan = provider.plan(&desired, &state).await.unwrap();
    let result = provider.apply(&plan, &desired, &mut state).await.unwrap();
    assert_eq!(result.failed.len(), 1);
    assert!(attached(&provider).await.is_empty());
}

#[tokio::test]
async fn test_detached_out_of_band_is_reported_and_reattached() {
    let provider = provider();
    provider.client().create_iam_user("test-user");
    let desired = resources(vec![(
        "aws_iam_user_policy_attachment",
        "read",
        json!({"user": "test-user", "policy_arn": READ_ONLY}),
    )]);
    let mut state = ProviderState::new();
    converge(&provider, &desired, &mut state).await;

    provider
        .client()
        .detach_user_policy("test-user", READ_ONLY)
        .await
        .unwrap();

    let drifts = provider.refresh(&mut state).await.unwrap();
    assert_eq!(drifts.len(), 1);
    assert_eq!(drifts[0].kind, DriftKind::Vanished);

    let plan = converge(&provider, &desired, &mut state).await;
    assert_eq!(plan.summary().create, 1);
    assert_eq!(attached(&provider).await, vec![READ_ONLY.to_string()]);
}

#[tokio::test]
async fn test_import_by_user_and_arn() {
    let provider = provider();
    provider.client().create_iam_user("test-user");
    provider
        .client()
        .attach_user_policy("test-user", READ_ONLY)
        .await
        .unwrap();

    let mut state = ProviderState::new();
    let imported = provider
        .import(
            "aws_iam_user_policy_attachment",
            "read",
            &format!("test-user/{}", READ_ONLY),
            &mut state,
        )
        .await
        .unwrap();
    assert_eq!(imported.attributes["policy_arn"], READ_ONLY);

    let err = provider
        .import(
            "aws_iam_user_policy_attachment",
            "power",
            &format!("test-user/{}", POWER_USER),
            &mut state,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Destroying twice: the second pass finds nothing recorded
    provider
        .destroy("aws_iam_user_policy_attachment:read", &mut state)
        .await
        .unwrap();
    assert!(attached(&provider).await.is_empty());
    let err = provider
        .destroy("aws_iam_user_policy_attachment:read", &mut state)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
