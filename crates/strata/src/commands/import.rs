use crate::context::Project;
use colored::Colorize;
use strata_aws::{AwsApi, AwsProvider};
use strata_cloud::CloudProvider;

pub async fn handle<C: AwsApi + 'static>(
    project: &Project,
    provider: &AwsProvider<C>,
    resource_type: &str,
    name: &str,
    id: &str,
) -> anyhow::Result<()> {
    let lock = project.lock().await?;
    let outcome = async {
        let (global, mut state) = project.load_state().await?;
        let imported = provider.import(resource_type, name, id, &mut state).await?;
        project.save_state(global, &state).await?;
        anyhow::Ok(imported)
    }
    .await;
    lock.release().await?;

    let imported = outcome?;
    println!(
        "{} {}:{} ({})",
        "✓ Imported".green().bold(),
        resource_type,
        name.cyan(),
        imported.id
    );
    Ok(())
}
