use crate::context::Project;
use crate::output;
use colored::Colorize;
use strata_aws::{AwsApi, AwsProvider};
use strata_cloud::CloudProvider;

pub async fn handle<C: AwsApi + 'static>(
    project: &Project,
    provider: &AwsProvider<C>,
    address: Option<String>,
    yes: bool,
) -> anyhow::Result<()> {
    let lock = project.lock().await?;
    let outcome = destroy_locked(project, provider, address, yes).await;
    lock.release().await?;
    outcome
}

async fn destroy_locked<C: AwsApi + 'static>(
    project: &Project,
    provider: &AwsProvider<C>,
    address: Option<String>,
    yes: bool,
) -> anyhow::Result<()> {
    let (global, mut state) = project.load_state().await?;

    let targets = match &address {
        Some(address) => {
            let recorded = state
                .get(address)
                .ok_or_else(|| anyhow::anyhow!("{} is not in state", address))?;
            vec![(address.clone(), recorded.id.clone())]
        }
        None => state
            .iter()
            .map(|(address, recorded)| (address.clone(), recorded.id.clone()))
            .collect(),
    };

    if targets.is_empty() {
        println!("{}", "Nothing to destroy".dimmed());
        return Ok(());
    }

    println!("{}", format!("Resources to destroy ({}):", targets.len()).bold());
    for (address, id) in &targets {
        println!("  {} {} {}", "-".red().bold(), address.cyan(), format!("({})", id).dimmed());
    }

    if !yes {
        println!();
        println!(
            "{}",
            "Warning: the remote objects will be deleted.".yellow()
        );
        println!("Run again with --yes to destroy them");
        return Ok(());
    }

    println!();
    match address {
        Some(address) => {
            let outcome = provider.destroy(&address, &mut state).await;
            project.save_state(global, &state).await?;
            outcome?;
            println!("{}", format!("✓ Destroyed {}", address).green().bold());
        }
        None => {
            let result = provider.destroy_all(&mut state).await?;
            project.save_state(global, &state).await?;
            output::print_result(&result);
            if !result.is_success() {
                anyhow::bail!("{} resource(s) could not be destroyed", result.failed.len());
            }
        }
    }
    Ok(())
}
