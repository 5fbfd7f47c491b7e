//! Resource file loading
//!
//! ```yaml
//! resources:
//!   - resource_type: aws_api_gateway_stage
//!     id: prod
//!     config:
//!       rest_api_id: abc123
//!       stage_name: prod
//!       deployment_id: dep456
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use strata_cloud::{ResourceConfig, ResourceSet};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceFile {
    #[serde(default)]
    resources: Vec<ResourceConfig>,
}

pub fn load(path: &Path) -> anyhow::Result<ResourceSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read resource file {}", path.display()))?;
    parse(&content).with_context(|| format!("invalid resource file {}", path.display()))
}

pub fn parse(content: &str) -> anyhow::Result<ResourceSet> {
    if content.trim().is_empty() {
        return Ok(ResourceSet::new());
    }
    let file: ResourceFile = serde_yaml::from_str(content)?;

    let mut seen = HashSet::new();
    for resource in &file.resources {
        if !seen.insert(resource.key()) {
            anyhow::bail!("{} is declared more than once", resource.key());
        }
        if resource.provider != crate::context::PROVIDER {
            anyhow::bail!(
                "{} uses provider '{}'; only '{}' is supported",
                resource.key(),
                resource.provider,
                crate::context::PROVIDER
            );
        }
    }

    Ok(file.resources.into_iter().collect())
}
