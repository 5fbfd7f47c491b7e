use crate::context::Project;
use strata_aws::MemoryCloud;

/// Print the normalized form of an import id, or fail with the parse error
pub fn handle_parse(project: &Project, resource_type: &str, raw: &str) -> anyhow::Result<()> {
    let registry = strata_aws::registry::<MemoryCloud>(&project.settings);
    let id = registry.get(resource_type)?.parse_id(raw)?;
    println!("{}", id);
    Ok(())
}
