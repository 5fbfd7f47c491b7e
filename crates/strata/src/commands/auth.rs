use colored::Colorize;
use strata_aws::{AwsApi, AwsProvider};
use strata_cloud::CloudProvider;

pub async fn handle<C: AwsApi + 'static>(provider: &AwsProvider<C>) -> anyhow::Result<()> {
    let status = provider.check_auth().await?;
    if status.authenticated {
        println!(
            "{} {}",
            "✓ Authenticated:".green().bold(),
            status.account_info.unwrap_or_default()
        );
        Ok(())
    } else {
        anyhow::bail!(
            "authentication failed: {}",
            status.error.unwrap_or_else(|| "unknown reason".to_string())
        )
    }
}
