use crate::context::Project;
use crate::output;
use colored::Colorize;
use strata_aws::{AwsApi, AwsProvider};
use strata_cloud::CloudProvider;

pub async fn handle<C: AwsApi + 'static>(
    project: &Project,
    provider: &AwsProvider<C>,
) -> anyhow::Result<()> {
    println!("{}", "Planning...".blue());
    println!(
        "Resource file: {}",
        project.resources_path.display().to_string().cyan()
    );

    let desired = project.load_resources()?;
    let (_, state) = project.load_state().await?;
    let plan = provider.plan(&desired, &state).await?;

    println!();
    output::print_plan(&plan);
    Ok(())
}
