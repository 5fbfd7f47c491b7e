//! Project context shared by every command

use crate::resources;
use std::path::PathBuf;
use strata_aws::{AccountContext, AwsApi, AwsProvider, MemoryCloud, retry_config};
use strata_cloud::{GlobalState, ProviderState, ResourceSet, StateLock, StateManager};
use strata_config::Settings;

/// Provider name the AWS resources are recorded under in the state file
pub const PROVIDER: &str = "aws";

const SANDBOX_FILE: &str = "sandbox.json";

pub struct Project {
    pub root: PathBuf,
    pub settings: Settings,
    pub resources_path: PathBuf,
    state: StateManager,
}

impl Project {
    /// Open the project in the current directory
    pub fn open(resources_file: PathBuf) -> anyhow::Result<Self> {
        let root = std::env::current_dir()?;
        let settings = strata_config::load_settings()?;
        let resources_path = if resources_file.is_absolute() {
            resources_file
        } else {
            root.join(resources_file)
        };
        let state = StateManager::new(&root).with_state_dir(settings.state_dir.clone());
        tracing::debug!(
            "Project {} (region {}, account {})",
            root.display(),
            settings.region,
            settings.account_id
        );

        Ok(Self {
            root,
            settings,
            resources_path,
            state,
        })
    }

    pub fn account(&self) -> AccountContext {
        AccountContext::from(&self.settings)
    }

    pub fn provider<C: AwsApi + 'static>(&self, client: C) -> AwsProvider<C> {
        AwsProvider::new(client, self.settings.clone())
    }

    pub fn load_resources(&self) -> anyhow::Result<ResourceSet> {
        resources::load(&self.resources_path)
    }

    pub fn sandbox_path(&self) -> PathBuf {
        self.state.state_dir().join(SANDBOX_FILE)
    }

    pub async fn open_sandbox(&self) -> anyhow::Result<MemoryCloud> {
        let cloud = MemoryCloud::load(self.account(), self.sandbox_path()).await?;
        Ok(cloud.with_retry(retry_config(&self.settings.retry)))
    }

    pub async fn save_sandbox(&self, cloud: &MemoryCloud) -> anyhow::Result<()> {
        cloud.save(self.sandbox_path()).await?;
        Ok(())
    }

    /// Load the whole state file and this provider's slice of it
    pub async fn load_state(&self) -> anyhow::Result<(GlobalState, ProviderState)> {
        let global = self.state.load().await?;
        let state = global.provider_state(PROVIDER);
        Ok((global, state))
    }

    pub async fn save_state(
        &self,
        mut global: GlobalState,
        state: &ProviderState,
    ) -> anyhow::Result<()> {
        global.set_provider_state(PROVIDER, state);
        self.state.save(&global).await?;
        Ok(())
    }

    pub async fn lock(&self) -> anyhow::Result<StateLock> {
        Ok(self.state.acquire_lock().await?)
    }
}
