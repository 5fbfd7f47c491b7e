use crate::commands::interrupted;
use crate::context::Project;
use crate::output;
use colored::Colorize;
use strata_aws::{AwsApi, AwsProvider};
use strata_cloud::{CloudProvider, ResourceSet};

pub async fn handle<C: AwsApi + 'static>(
    project: &Project,
    provider: &AwsProvider<C>,
    yes: bool,
) -> anyhow::Result<()> {
    let desired = project.load_resources()?;

    let lock = project.lock().await?;
    let outcome = apply_locked(project, provider, &desired, yes).await;
    lock.release().await?;
    outcome
}

async fn apply_locked<C: AwsApi + 'static>(
    project: &Project,
    provider: &AwsProvider<C>,
    desired: &ResourceSet,
    yes: bool,
) -> anyhow::Result<()> {
    let (global, mut state) = project.load_state().await?;
    let plan = provider.plan(desired, &state).await?;
    output::print_plan(&plan);

    if !plan.has_changes {
        return Ok(());
    }
    if !yes {
        println!();
        println!("Run again with --yes to apply these changes");
        return Ok(());
    }

    println!();
    println!("{}", "Applying...".blue());
    let result = provider
        .apply_until(&plan, desired, &mut state, interrupted())
        .await;

    // Record whatever completed, including cleanup after an interrupt
    project.save_state(global, &state).await?;

    let result = result?;
    output::print_result(&result);
    if !result.is_success() {
        anyhow::bail!("{} action(s) failed", result.failed.len());
    }
    Ok(())
}
