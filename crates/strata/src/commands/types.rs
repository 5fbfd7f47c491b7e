use crate::context::Project;
use colored::Colorize;
use strata_aws::{DATA_SOURCE_TYPES, MemoryCloud};

pub fn handle(project: &Project) {
    let registry = strata_aws::registry::<MemoryCloud>(&project.settings);

    println!("{}", "Resource types:".bold());
    for resource_type in registry.resource_types() {
        println!("  • {}", resource_type.cyan());
    }
    println!("{}", "Data sources:".bold());
    for data_source in DATA_SOURCE_TYPES {
        println!("  • {}", data_source.cyan());
    }
}
