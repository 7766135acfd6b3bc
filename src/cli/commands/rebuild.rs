//! Rebuild command implementation
//!
//! Implements `gamestack rebuild`: every managed service found in the
//! topology is mapped back to its project through the project-path
//! registry and rebuilt on the port it already publishes. The topology
//! itself is left as is.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use super::build::{create_task, deploy, print_summary};
use crate::cli::output::{create_spinner, status, OutputConfig};
use crate::core::batch::{self, plan_rebuild};
use crate::core::project_paths::ProjectPathRegistry;
use crate::core::topology::TopologyState;
use crate::core::workspace::{BuildOverrides, Workspace};

/// Rebuild options
pub struct RebuildOptions {
    /// Restrict to these project ids
    pub projects: Vec<String>,
    /// Pinned runtime bridge jar
    pub local_engine: Option<PathBuf>,
    /// Redeploy afterwards
    pub deploy: bool,
    /// Deploy with compose instead of a swarm stack
    pub compose: bool,
}

/// Execute the rebuild command
pub async fn execute(workspace_dir: &Path, options: RebuildOptions) -> Result<()> {
    let output = OutputConfig::global();
    let workspace =
        Workspace::open(workspace_dir).context("Failed to load workspace configuration")?;

    let topology_path = workspace.topology_path();
    let Some(state) = TopologyState::load(&topology_path)? else {
        bail!(
            "No topology found at {}. Run 'gamestack build' first.",
            topology_path.display()
        );
    };
    let registry = ProjectPathRegistry::load(&workspace.project_paths_path())
        .context("Failed to load project registry")?;

    let plan = plan_rebuild(&state, &registry, &options.projects);
    for skip in &plan.skipped {
        tracing::warn!("Not rebuilding {}: {}", skip.service, skip.reason);
        if !output.quiet {
            eprintln!("{} Skipping {}: {}", status::WARNING, skip.service, skip.reason);
        }
    }
    if plan.jobs.is_empty() {
        bail!("No managed projects to rebuild");
    }

    let overrides = BuildOverrides {
        bridge_path: options
            .local_engine
            .map(|p| std::fs::canonicalize(&p).unwrap_or(p)),
        bridge_build_dir: None,
    };
    let (task, runtime) = create_task(&workspace, &overrides)?;

    let spinner = create_spinner(&format!("Rebuilding {} project(s)...", plan.jobs.len()));
    let summary = batch::run_rebuild(task, plan).await;
    spinner.finish_and_clear();

    print_summary(&summary, output)?;
    if !summary.succeeded() {
        bail!("No projects were rebuilt successfully");
    }

    if options.deploy {
        deploy(&workspace, runtime, options.compose, output).await?;
    }
    Ok(())
}
