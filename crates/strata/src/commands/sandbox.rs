//! Parent objects the reconcilers expect to exist already

use crate::SandboxCommands;
use crate::context::Project;
use colored::Colorize;
use strata_aws::MemoryCloud;

pub fn handle(
    project: &Project,
    cloud: &MemoryCloud,
    command: SandboxCommands,
) -> anyhow::Result<()> {
    match command {
        SandboxCommands::RestApi { name } => {
            let (api_id, deployment_id) = cloud.create_rest_api(&name);
            println!("rest_api_id: {}", api_id);
            println!("deployment_id: {}", deployment_id);
        }
        SandboxCommands::Deployment { rest_api_id } => {
            let deployment_id = cloud.create_deployment(&rest_api_id)?;
            println!("deployment_id: {}", deployment_id);
        }
        SandboxCommands::DeleteRestApi { rest_api_id } => {
            cloud.delete_rest_api(&rest_api_id)?;
            println!("{} {}", "✓ Deleted REST API".green(), rest_api_id);
        }
        SandboxCommands::GlueDatabase { name, catalog_id } => {
            let catalog_id = catalog_id.unwrap_or_else(|| project.settings.account_id.clone());
            cloud.create_glue_database(&catalog_id, &name);
            println!("{} {}/{}", "✓ Created Glue database".green(), catalog_id, name);
        }
        SandboxCommands::IamUser { name } => {
            cloud.create_iam_user(&name);
            println!("{} {}", "✓ Created IAM user".green(), name);
        }
        SandboxCommands::IamPolicy { name } => {
            println!("policy_arn: {}", cloud.create_iam_policy(&name));
        }
        SandboxCommands::AppconfigApplication { name } => {
            println!("application_id: {}", cloud.create_appconfig_application(&name));
        }
    }
    Ok(())
}
