//! List command implementation
//!
//! Implements `gamestack list` to show what the workspace topology and the
//! project-path registry currently hold.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::output::{status, OutputConfig};
use crate::core::project_paths::ProjectPathRegistry;
use crate::core::topology::TopologyState;
use crate::core::workspace::Workspace;

/// Execute the list command
pub async fn execute(workspace_dir: &Path) -> Result<()> {
    let output = OutputConfig::global();
    let workspace =
        Workspace::open(workspace_dir).context("Failed to load workspace configuration")?;

    let state = TopologyState::load(&workspace.topology_path())?.unwrap_or_default();
    let registry = ProjectPathRegistry::load(&workspace.project_paths_path())
        .context("Failed to load project registry")?;
    let managed = state.managed_projects();
    let preserved = state.preserved_names();

    if output.json {
        let report = serde_json::json!({
            "managed": managed,
            "preserved": preserved,
            "projects": registry,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if managed.is_empty() && preserved.is_empty() {
        println!("{} No services in {}", status::INFO, workspace.topology_path().display());
    }

    if !managed.is_empty() {
        println!("Managed services:");
        for project in &managed {
            let name = project.name.as_deref().unwrap_or(&project.project_id);
            println!(
                "  {:<24} {:<24} port {}",
                project.service, name, project.port
            );
        }
    }

    if !preserved.is_empty() {
        println!("Preserved services:");
        for name in &preserved {
            println!("  {name}");
        }
    }

    if !registry.is_empty() {
        println!("Known projects:");
        for (project_id, location) in registry.iter() {
            println!("  {:<24} {}", project_id, location.path.display());
        }
    }
    Ok(())
}
