use anyhow::Context;
use strata_aws::{AwsApi, AwsProvider};

pub async fn handle<C: AwsApi + 'static>(
    provider: &AwsProvider<C>,
    data_source_type: &str,
    query: &str,
) -> anyhow::Result<()> {
    let query: serde_json::Value =
        serde_json::from_str(query).context("query must be a JSON object")?;
    let output = provider.read_data(data_source_type, &query).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
