//! `aws_appconfig_configuration_profiles` data source

use super::AppConfigApi;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_cloud::{DataSource, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationProfilesQuery {
    pub application_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationProfilesOutput {
    pub id: String,
    pub application_id: String,
    pub configuration_profile_ids: Vec<String>,
}

/// Lists the ids of every configuration profile of an application
#[derive(Debug, Default)]
pub struct ConfigurationProfilesDataSource;

#[async_trait]
impl<C: AppConfigApi + ?Sized> DataSource<C> for ConfigurationProfilesDataSource {
    type Query = ConfigurationProfilesQuery;
    type Output = ConfigurationProfilesOutput;

    fn data_source_type(&self) -> &'static str {
        "aws_appconfig_configuration_profiles"
    }

    async fn read(
        &self,
        client: &C,
        query: &ConfigurationProfilesQuery,
    ) -> Result<ConfigurationProfilesOutput> {
        let mut ids: Vec<String> = client
            .list_configuration_profiles(&query.application_id)
            .await
            .map_err(|e| {
                e.for_resource("aws_appconfig_configuration_profiles", &query.application_id)
            })?
            .into_iter()
            .map(|p| p.id)
            .collect();
        ids.sort();

        Ok(ConfigurationProfilesOutput {
            id: query.application_id.clone(),
            application_id: query.application_id.clone(),
            configuration_profile_ids: ids,
        })
    }
}
