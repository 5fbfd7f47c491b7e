use crate::context::Project;
use crate::output;
use colored::Colorize;
use strata_aws::{AwsApi, AwsProvider};
use strata_cloud::CloudProvider;

pub async fn handle<C: AwsApi + 'static>(
    project: &Project,
    provider: &AwsProvider<C>,
) -> anyhow::Result<()> {
    println!("{}", "Refreshing state...".blue());

    let lock = project.lock().await?;
    let outcome = async {
        let (global, mut state) = project.load_state().await?;
        let drifts = provider.refresh(&mut state).await?;
        project.save_state(global, &state).await?;
        output::print_drift(&drifts);
        anyhow::Ok(())
    }
    .await;
    lock.release().await?;
    outcome
}
