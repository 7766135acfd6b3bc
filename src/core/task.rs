//! Build Task
//!
//! Turns one project directory into a tagged image inside an isolated
//! scratch workspace. Every step is a commit point: the first failure ends
//! the task, the workspace is dropped and a [`BuildFailure`] names the step.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tracing::Instrument;

use crate::config::defaults;
use crate::core::bridge::acquire_bridge;
use crate::core::build_config::BuildConfig;
use crate::core::context::{self, PLUGINS_DIR};
use crate::core::descriptor::{GameMetadata, ProjectDescriptor, ResourceRequest};
use crate::core::dockerfile::{ImageRecipe, DOCKERFILE};
use crate::core::resolver::ArtifactResolver;
use crate::core::sanitize::{container_name, sanitize_name, tag_component};
use crate::error::{FilesystemError, TaskError};
use crate::infra::filesystem;

/// External project build
#[async_trait]
pub trait ProjectCompiler: Send + Sync {
    /// Build the project in `project_dir` and return its single output file
    async fn compile(&self, project_dir: &Path) -> Result<PathBuf, TaskError>;
}

/// External image build
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build the context in `context_dir` under every tag in `tags`
    async fn build_image(&self, context_dir: &Path, tags: &[String]) -> Result<(), TaskError>;
}

/// Steps of a Build Task, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStep {
    /// Scratch workspace creation
    Workspace,
    /// Runtime bridge acquisition
    RuntimeBridge,
    /// External project build
    Compile,
    /// Dependency library resolution
    Dependencies,
    /// Project-supplied plugin merge
    AuxiliaryPlugins,
    /// Static tree copy
    StaticTrees,
    /// Proxy trust fragment merge
    ProxyConfig,
    /// Identity marker
    IdentityMarker,
    /// Image build descriptor
    ImageDescriptor,
    /// External image build
    ImageBuild,
    /// Claiming the topology service key
    ServiceName,
    /// Reserving a published port
    PortAssignment,
    /// Task ended without reporting a result
    Aborted,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Workspace => "workspace",
            Self::RuntimeBridge => "runtime bridge",
            Self::Compile => "compile",
            Self::Dependencies => "dependencies",
            Self::AuxiliaryPlugins => "auxiliary plugins",
            Self::StaticTrees => "static trees",
            Self::ProxyConfig => "proxy config",
            Self::IdentityMarker => "identity marker",
            Self::ImageDescriptor => "image descriptor",
            Self::ImageBuild => "image build",
            Self::ServiceName => "service name",
            Self::PortAssignment => "port assignment",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A Build Task that did not produce an image
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{project_id}: {step} failed: {error}")]
pub struct BuildFailure {
    /// Project that failed
    pub project_id: String,
    /// Step that failed
    pub step: BuildStep,
    /// What went wrong
    pub error: TaskError,
}

/// A successfully built project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildResult {
    /// Project identifier
    pub project_id: String,
    /// Topology service key
    pub service_name: String,
    /// Container name announced to the runtime
    pub container_name: String,
    /// Game name
    pub game_name: String,
    /// Human-facing name
    pub display_name: Option<String>,
    /// Namespace identifier
    pub namespace_id: Option<String>,
    /// Descriptive metadata
    pub metadata: GameMetadata,
    /// Canonical image reference (first tag)
    pub image_reference: String,
    /// Every tag the image was built with; the first is canonical
    pub image_tags: Vec<String>,
    /// Published game port
    pub assigned_port: u16,
    /// Values for declared secret keys
    pub secret_vars: BTreeMap<String, String>,
    /// Backing stores requested by the project
    pub resources: Vec<ResourceRequest>,
}

impl BuildResult {
    /// Name shown to humans
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.game_name)
    }
}

/// Image repository name for a project
pub fn image_base(project_id: &str) -> String {
    format!("{}-{}", defaults::IMAGE_PREFIX, sanitize_name(project_id))
}

/// Tags for a project's image: canonical first, then name-derived ones
pub fn image_tags(project_id: &str, game_name: &str, display_name: Option<&str>) -> Vec<String> {
    let base = image_base(project_id);
    let mut tags = vec![format!("{base}:latest")];

    let derived = std::iter::once(game_name)
        .chain(display_name)
        .filter_map(tag_component)
        .map(|component| format!("{base}:{component}"));
    for tag in derived {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Builds one project into an image
#[derive(Clone)]
pub struct BuildTask {
    config: Arc<BuildConfig>,
    resolver: Arc<ArtifactResolver>,
    compiler: Arc<dyn ProjectCompiler>,
    images: Arc<dyn ImageBuilder>,
}

impl fmt::Debug for BuildTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTask")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BuildTask {
    /// Create a Build Task over shared collaborators
    pub fn new(
        config: Arc<BuildConfig>,
        resolver: Arc<ArtifactResolver>,
        compiler: Arc<dyn ProjectCompiler>,
        images: Arc<dyn ImageBuilder>,
    ) -> Self {
        Self {
            config,
            resolver,
            compiler,
            images,
        }
    }

    /// Batch configuration
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build `descriptor` into an image published on `port`
    pub async fn build(
        &self,
        descriptor: &ProjectDescriptor,
        port: u16,
    ) -> Result<BuildResult, BuildFailure> {
        let span = tracing::info_span!("build", project_id = %descriptor.project_id, port);
        self.run(descriptor, port).instrument(span).await
    }

    async fn run(
        &self,
        descriptor: &ProjectDescriptor,
        port: u16,
    ) -> Result<BuildResult, BuildFailure> {
        let fail = |step: BuildStep| {
            let project_id = descriptor.project_id.clone();
            move |error: TaskError| BuildFailure {
                project_id,
                step,
                error,
            }
        };

        tracing::info!("Building {}", descriptor.service_name);

        // Dropped on every return path, which removes the workspace
        let workspace = self
            .create_workspace(&descriptor.project_id)
            .map_err(|e| fail(BuildStep::Workspace)(e.into()))?;
        let root = workspace.path();
        let plugins = root.join(PLUGINS_DIR);
        filesystem::create_dir_all(&plugins).map_err(|e| fail(BuildStep::Workspace)(e.into()))?;

        let origin = acquire_bridge(&self.config.bridge, &self.resolver, &plugins)
            .await
            .map_err(fail(BuildStep::RuntimeBridge))?;
        tracing::info!("Runtime bridge from {origin}");

        let artifact = self
            .compile(&descriptor.source_dir)
            .await
            .map_err(fail(BuildStep::Compile))?;
        let artifact_name = artifact.file_name().map(ToOwned::to_owned).ok_or_else(|| {
            fail(BuildStep::Compile)(TaskError::ExternalBuildFailed {
                message: format!("output '{}' has no file name", artifact.display()),
            })
        })?;
        filesystem::copy_file(&artifact, &plugins.join(&artifact_name))
            .map_err(|e| fail(BuildStep::Compile)(e.into()))?;
        tracing::info!("Compiled {}", artifact_name.to_string_lossy());

        let resolved = context::resolve_dependencies(&self.resolver, descriptor, &plugins)
            .await
            .map_err(fail(BuildStep::Dependencies))?;
        tracing::info!("Resolved {} dependency libraries", resolved.len());

        let bridge_file = &self.resolver.catalog().bridge().file_name;
        let aux = context::merge_aux_plugins(&descriptor.source_dir, &plugins, bridge_file)
            .map_err(|e| fail(BuildStep::AuxiliaryPlugins)(e.into()))?;
        if !aux.is_empty() {
            tracing::info!("Added project plugins: {}", aux.join(", "));
        }

        context::copy_static_trees(&descriptor.source_dir, root)
            .map_err(|e| fail(BuildStep::StaticTrees)(e.into()))?;

        context::merge_proxy_config(root, &self.config.forwarding_secret)
            .map_err(fail(BuildStep::ProxyConfig))?;

        let container = container_name(&descriptor.service_name);
        context::write_identity_marker(root, &container)
            .map_err(|e| fail(BuildStep::IdentityMarker)(e.into()))?;

        let recipe = ImageRecipe::for_workspace(root);
        filesystem::write_file(&root.join(DOCKERFILE), &recipe.render())
            .map_err(|e| fail(BuildStep::ImageDescriptor)(e.into()))?;

        let tags = image_tags(
            &descriptor.project_id,
            &descriptor.service_name,
            descriptor.display_name.as_deref(),
        );
        self.images
            .build_image(root, &tags)
            .await
            .map_err(fail(BuildStep::ImageBuild))?;
        tracing::info!("Built {}", tags.join(", "));

        let secret_vars = self
            .config
            .secrets
            .resolve(&descriptor.project_id, &descriptor.secret_keys);

        Ok(BuildResult {
            project_id: descriptor.project_id.clone(),
            service_name: descriptor.service_key(),
            container_name: container,
            game_name: descriptor.service_name.clone(),
            display_name: descriptor.display_name.clone(),
            namespace_id: descriptor.namespace_id.clone(),
            metadata: descriptor.metadata.clone(),
            image_reference: tags[0].clone(),
            image_tags: tags,
            assigned_port: port,
            secret_vars,
            resources: descriptor.resources.clone(),
        })
    }

    fn create_workspace(&self, project_id: &str) -> Result<TempDir, FilesystemError> {
        let prefix = format!("gamestack-build-{}-", sanitize_name(project_id));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let created = match &self.config.scratch_root {
            Some(root) => {
                filesystem::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        };
        created.map_err(|e| FilesystemError::CreateDir {
            path: self
                .config
                .scratch_root
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            error: e.to_string(),
        })
    }

    async fn compile(&self, project_dir: &Path) -> Result<PathBuf, TaskError> {
        let budget = self.config.compile_timeout;
        tokio::time::timeout(budget, self.compiler.compile(project_dir))
            .await
            .map_err(|_| TaskError::ExternalBuildTimeout {
                secs: budget.as_secs(),
            })?
    }
}
