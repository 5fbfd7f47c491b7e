//! Terminal rendering of plans and results

use colored::{ColoredString, Colorize};
use strata_cloud::{Action, ActionType, ApplyResult, Drift, DriftKind, Plan, ResourceStatus};

fn marker(action_type: ActionType) -> ColoredString {
    match action_type {
        ActionType::Create => "+".green().bold(),
        ActionType::Update => "~".yellow().bold(),
        ActionType::Replace => "-/+".red().bold(),
        ActionType::Delete => "-".red().bold(),
        ActionType::NoOp => " ".normal(),
    }
}

fn print_action(action: &Action) {
    let identity = action
        .identity
        .as_deref()
        .map(|id| format!(" ({})", id))
        .unwrap_or_default();
    println!(
        "  {} {}{}",
        marker(action.action_type),
        action.resource_id.cyan(),
        identity.dimmed()
    );

    for change in &action.diff.changes {
        let forces = if change.update == strata_cloud::UpdatePolicy::ForcesReplacement {
            " (forces replacement)".red().to_string()
        } else {
            String::new()
        };
        println!(
            "      {}: {} → {}{}",
            change.name,
            change.before.to_string().dimmed(),
            change.after,
            forces
        );
    }
}

pub fn print_plan(plan: &Plan) {
    if !plan.has_changes {
        println!("{}", "✓ No changes. Resources match the declaration.".green());
        return;
    }

    println!("{}", "Planned actions:".bold());
    for action in plan
        .actions
        .iter()
        .filter(|a| a.action_type != ActionType::NoOp)
    {
        print_action(action);
    }
    println!();
    println!("Plan: {}", plan.summary());
}

pub fn print_result(result: &ApplyResult) {
    for ok in &result.succeeded {
        println!("  {} {}", "✓".green(), ok.message);
    }
    for failed in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failed.action_id,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!();
    if result.is_success() {
        println!(
            "{}",
            format!(
                "✓ {} action(s) completed in {}ms",
                result.succeeded.len(),
                result.duration_ms
            )
            .green()
            .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "✗ {} of {} action(s) failed",
                result.failed.len(),
                result.failed.len() + result.succeeded.len()
            )
            .red()
            .bold()
        );
    }
}

pub fn print_drift(drifts: &[Drift]) {
    if drifts.is_empty() {
        println!("{}", "✓ No drift detected".green());
        return;
    }

    println!("{}", format!("Drift in {} resource(s):", drifts.len()).yellow());
    for drift in drifts {
        match &drift.kind {
            DriftKind::Vanished => println!(
                "  {} {} ({}) no longer exists",
                "-".red().bold(),
                drift.address.cyan(),
                drift.id.dimmed()
            ),
            DriftKind::Changed(names) => println!(
                "  {} {} changed: {}",
                "~".yellow().bold(),
                drift.address.cyan(),
                names.join(", ")
            ),
        }
    }
}

pub fn status(status: ResourceStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        ResourceStatus::Present => label.green(),
        ResourceStatus::Error | ResourceStatus::Absent => label.red(),
        ResourceStatus::Unknown => label.dimmed(),
        _ => label.yellow(),
    }
}
