use crate::StateCommands;
use crate::context::Project;
use crate::output;
use colored::Colorize;

pub async fn handle(project: &Project, command: &StateCommands) -> anyhow::Result<()> {
    match command {
        StateCommands::List => list(project).await,
        StateCommands::Show { address } => show(project, address).await,
        StateCommands::Rm { address } => remove(project, address).await,
    }
}

async fn list(project: &Project) -> anyhow::Result<()> {
    let (_, state) = project.load_state().await?;
    if state.is_empty() {
        println!("{}", "No resources in state".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<50} {:<10} {}", "ADDRESS", "STATUS", "ID").bold()
    );
    println!("{}", "─".repeat(100).dimmed());
    for address in state.addresses() {
        if let Some(recorded) = state.get(&address) {
            println!(
                "{:<50} {:<10} {}",
                address.cyan(),
                output::status(recorded.status),
                recorded.id
            );
        }
    }
    Ok(())
}

async fn show(project: &Project, address: &str) -> anyhow::Result<()> {
    let (_, state) = project.load_state().await?;
    let recorded = state
        .get(address)
        .ok_or_else(|| anyhow::anyhow!("{} is not in state", address))?;
    println!("{}", serde_json::to_string_pretty(recorded)?);
    Ok(())
}

async fn remove(project: &Project, address: &str) -> anyhow::Result<()> {
    let lock = project.lock().await?;
    let outcome = async {
        let (global, mut state) = project.load_state().await?;
        let removed = state
            .remove(address)
            .ok_or_else(|| anyhow::anyhow!("{} is not in state", address))?;
        project.save_state(global, &state).await?;
        anyhow::Ok(removed)
    }
    .await;
    lock.release().await?;

    let removed = outcome?;
    println!(
        "{} {} ({}); the remote object was left in place",
        "✓ Forgot".green().bold(),
        address.cyan(),
        removed.id
    );
    Ok(())
}
