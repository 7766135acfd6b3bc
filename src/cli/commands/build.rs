//! Build command implementation
//!
//! Implements `gamestack build` to turn project directories into images,
//! merge them into the workspace topology and optionally deploy it.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::output::{create_spinner, status, OutputConfig};
use crate::core::artifact::ArtifactCatalog;
use crate::core::batch::{self, BatchSummary};
use crate::core::descriptor::ProjectDescriptor;
use crate::core::resolver::ArtifactResolver;
use crate::core::task::BuildTask;
use crate::core::workspace::{BuildOverrides, Workspace};
use crate::infra::dirs::GamestackDirs;
use crate::infra::docker::{ContainerRuntime, DeployMode, Deployer, DockerImageBuilder};
use crate::infra::gradle::GradleCompiler;

/// Build options
pub struct BuildOptions {
    /// Project directories
    pub projects: Vec<PathBuf>,
    /// Pinned runtime bridge jar
    pub local_engine: Option<PathBuf>,
    /// Directory of local runtime bridge builds
    pub local_engine_build: Option<PathBuf>,
    /// Deploy after building
    pub deploy: bool,
    /// Deploy with compose instead of a swarm stack
    pub compose: bool,
}

/// Execute the build command
pub async fn execute(workspace_dir: &Path, options: BuildOptions) -> Result<()> {
    let output = OutputConfig::global();
    let workspace =
        Workspace::open(workspace_dir).context("Failed to load workspace configuration")?;

    let descriptors = load_descriptors(&options.projects, output);
    if descriptors.is_empty() {
        bail!("No valid projects to build");
    }

    let overrides = BuildOverrides {
        bridge_path: options.local_engine.as_deref().map(absolute),
        bridge_build_dir: options.local_engine_build.as_deref().map(absolute),
    };
    let (task, runtime) = create_task(&workspace, &overrides)?;

    let spinner = create_spinner(&format!("Building {} project(s)...", descriptors.len()));
    let summary = batch::run_batch(&workspace, task, descriptors).await;
    spinner.finish_and_clear();
    let summary = summary.context("Failed to record build results")?;

    print_summary(&summary, output)?;
    if !summary.succeeded() {
        bail!("No projects were built successfully");
    }
    if output.interactive() {
        println!(
            "{} Topology written to {}",
            status::SUCCESS,
            workspace.topology_path().display()
        );
    }

    if options.deploy {
        deploy(&workspace, runtime, options.compose, output).await?;
    }
    Ok(())
}

/// Load every project; invalid projects and projects whose service key is
/// already taken are reported and skipped
pub fn load_descriptors(paths: &[PathBuf], output: OutputConfig) -> Vec<ProjectDescriptor> {
    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();
    for path in paths {
        let dir = absolute(path);
        match ProjectDescriptor::load(&dir) {
            Ok(descriptor) if !seen.insert(descriptor.service_key()) => {
                tracing::warn!(
                    "Project '{}' maps to service '{}' already in this batch; skipping {}",
                    descriptor.project_id,
                    descriptor.service_key(),
                    dir.display()
                );
                if !output.quiet {
                    eprintln!(
                        "{} Skipping {}: service '{}' is already taken",
                        status::WARNING,
                        path.display(),
                        descriptor.service_key()
                    );
                }
            }
            Ok(descriptor) => {
                tracing::info!("Loaded project {} from {}", descriptor.project_id, dir.display());
                descriptors.push(descriptor);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", dir.display());
                if !output.quiet {
                    eprintln!("{} Skipping {}: {e}", status::WARNING, path.display());
                }
            }
        }
    }
    descriptors
}

/// Wire the real collaborators into a Build Task
pub(crate) fn create_task(
    workspace: &Workspace,
    overrides: &BuildOverrides,
) -> Result<(BuildTask, ContainerRuntime)> {
    let images = DockerImageBuilder::detect()
        .context("No container runtime found. Install docker or podman.")?;
    let runtime = images.runtime();
    tracing::info!("Using container runtime: {}", runtime.command());

    let config = workspace.build_config(overrides, Some(GamestackDirs::new().bridge_cache_path()));
    let resolver = ArtifactResolver::new(ArtifactCatalog::default());
    let task = BuildTask::new(
        Arc::new(config),
        Arc::new(resolver),
        Arc::new(GradleCompiler::new()),
        Arc::new(images),
    );
    Ok((task, runtime))
}

/// Print per-project results, failures and resource conflicts
pub(crate) fn print_summary(summary: &BatchSummary, output: OutputConfig) -> Result<()> {
    if output.json {
        let report = serde_json::json!({
            "projects": summary.outcome_summaries(),
            "conflicts": summary.conflicts,
            "persisted": summary.persisted,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for failure in &summary.failures {
        eprintln!("{} {failure}", status::ERROR);
    }
    if output.quiet {
        return Ok(());
    }
    for conflict in &summary.conflicts {
        println!(
            "{} Resource '{}' from {} ignored; already declared by {}",
            status::WARNING,
            conflict.name,
            conflict.skipped_project,
            conflict.kept_project
        );
    }
    if summary.successes.is_empty() {
        return Ok(());
    }
    println!("\nBuilt {} project(s):", summary.successes.len());
    for result in &summary.successes {
        println!(
            "  {} {} ({})",
            status::SUCCESS,
            result.label(),
            result.project_id
        );
        println!("      image: {}", result.image_reference);
        println!("      port:  {}", result.assigned_port);
    }
    Ok(())
}

/// Bring the workspace topology up with the container runtime
pub(crate) async fn deploy(
    workspace: &Workspace,
    runtime: ContainerRuntime,
    compose: bool,
    output: OutputConfig,
) -> Result<()> {
    let mode = if compose {
        DeployMode::Compose
    } else {
        DeployMode::Stack
    };
    let deployer = Deployer::new(runtime, mode, &workspace.config().stack.name);

    let spinner = create_spinner(&format!("Deploying stack '{}'...", deployer.stack_name()));
    let result = deployer.deploy(&workspace.topology_path()).await;
    spinner.finish_and_clear();
    result.context("Deployment failed")?;

    if output.interactive() {
        println!("{} Deployed stack '{}'", status::SUCCESS, deployer.stack_name());
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
