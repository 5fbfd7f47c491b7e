mod common;

use common::TestProject;
use predicates::prelude::*;

fn stage_resources(api: &str, deployment: &str, description: &str) -> String {
    format!(
        "\
resources:
  - resource_type: aws_api_gateway_stage
    id: prod
    config:
      rest_api_id: {api}
      stage_name: prod
      deployment_id: {deployment}
      description: {description}
      variables:
        mode: live
"
    )
}

fn setup_stage(project: &TestProject) -> (String, String) {
    let api = project.sandbox_value(&["sandbox", "rest-api", "orders"], "rest_api_id");
    let deployment = project.sandbox_value(
        &["sandbox", "deployment", api.as_str()],
        "deployment_id",
    );
    project.write_resources(&stage_resources(&api, &deployment, "live"));
    (api, deployment)
}

#[test]
fn test_plan_apply_destroy_cycle() {
    let project = TestProject::new();
    let (api, deployment) = setup_stage(&project);

    project
        .strata()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("aws_api_gateway_stage:prod"))
        .stdout(predicate::str::contains("1 to create"));

    // Without --yes nothing is applied
    project
        .strata()
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
    assert!(project.run(&["state", "list"]).contains("No resources in state"));

    project
        .strata()
        .args(["apply", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 action(s) completed"));

    project
        .strata()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));

    let listed = project.run(&["state", "list"]);
    assert!(listed.contains("aws_api_gateway_stage:prod"));
    assert!(listed.contains("present"));
    assert!(listed.contains(&format!("{}/prod", api)));

    project
        .strata()
        .args(["state", "show", "aws_api_gateway_stage:prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invoke_url"))
        .stdout(predicate::str::contains(deployment.as_str()));

    // A changed description is an in-place update
    project.write_resources(&stage_resources(&api, &deployment, "canary"));
    project
        .strata()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 to update"))
        .stdout(predicate::str::contains("description"));
    project.run(&["apply", "--yes"]);

    project
        .strata()
        .args(["destroy", "--yes"])
        .assert()
        .success();
    assert!(project.run(&["state", "list"]).contains("No resources in state"));
    assert!(project.path().join(".strata/sandbox.json").exists());
}

#[test]
fn test_refresh_reports_vanished_parent() {
    let project = TestProject::new();
    let (api, _) = setup_stage(&project);
    project.run(&["apply", "--yes"]);

    project.run(&["sandbox", "delete-rest-api", api.as_str()]);
    project
        .strata()
        .arg("refresh")
        .assert()
        .success()
        .stdout(predicate::str::contains("no longer exists"));

    let listed = project.run(&["state", "list"]);
    assert!(listed.contains("absent"));

    // Deleting an already-gone object succeeds
    project
        .strata()
        .args(["destroy", "aws_api_gateway_stage:prod", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Destroyed"));
}

#[test]
fn test_state_rm_then_import() {
    let project = TestProject::new();
    let (api, _) = setup_stage(&project);
    project.run(&["apply", "--yes"]);

    project
        .strata()
        .args(["state", "rm", "aws_api_gateway_stage:prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("left in place"));

    // The stage still exists, so re-creating it conflicts
    project
        .strata()
        .args(["apply", "--yes"])
        .assert()
        .failure();

    let id = format!("{}/prod", api);
    project
        .strata()
        .args(["import", "aws_api_gateway_stage", "prod", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported"));

    project
        .strata()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));

    project
        .strata()
        .args(["import", "aws_api_gateway_stage", "prod", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already managed"));
}

#[test]
fn test_failed_action_exits_non_zero() {
    let project = TestProject::new();
    let (api, deployment) = setup_stage(&project);
    project.write_resources(&format!(
        "\
resources:
  - resource_type: aws_api_gateway_stage
    id: prod
    config:
      rest_api_id: {api}
      stage_name: prod
      deployment_id: {deployment}
      cache_cluster_enabled: true
      cache_cluster_size: \"3.3\"
"
    ));

    project
        .strata()
        .args(["apply", "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn test_read_data_source() {
    let project = TestProject::new();
    let app = project.sandbox_value(
        &["sandbox", "appconfig-application", "checkout"],
        "application_id",
    );
    project.write_resources(&format!(
        "\
resources:
  - resource_type: aws_appconfig_configuration_profile
    id: flags
    config:
      application_id: {app}
      name: flags
      location_uri: hosted
      type: AWS.AppConfig.FeatureFlags
"
    ));
    project.run(&["apply", "--yes"]);

    let query = format!("{{\"application_id\": \"{}\"}}", app);
    let stdout = project.run(&["read", "aws_appconfig_configuration_profiles", query.as_str()]);
    let output: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(output["application_id"], app.as_str());
    assert_eq!(output["configuration_profile_ids"].as_array().unwrap().len(), 1);

    project
        .strata()
        .args(["read", "aws_appconfig_configuration_profiles", "not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON"));
}

#[test]
fn test_auth_against_sandbox() {
    let project = TestProject::new();
    project
        .strata()
        .arg("auth")
        .assert()
        .success()
        .stdout(predicate::str::contains("123456789012"));
}
