//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a scratch
//! workspace with project writers, and fake external build tools.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use gamestack::core::artifact::ArtifactCatalog;
use gamestack::core::build_config::{BridgeSource, BuildConfig};
use gamestack::core::resolver::ArtifactResolver;
use gamestack::core::secrets::SecretValues;
use gamestack::core::task::{BuildTask, ImageBuilder, ProjectCompiler};
use gamestack::error::TaskError;

/// Test project context
///
/// A temporary directory used as the workspace root; game projects are
/// written into subdirectories of it.
pub struct TestProject {
    /// Temporary directory for the workspace
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test workspace in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the workspace directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the workspace
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the workspace
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the workspace
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Write a minimal game project and return its directory
    pub fn add_game(&self, dir_name: &str, project_id: &str) -> PathBuf {
        self.add_game_with(
            dir_name,
            &format!("projectId: {project_id}\ngame:\n  name: {dir_name}\n"),
        )
    }

    /// Write a game project with an explicit manifest body
    pub fn add_game_with(&self, dir_name: &str, manifest: &str) -> PathBuf {
        self.create_file(&format!("{dir_name}/config/game-properties.yaml"), manifest);
        self.dir.path().join(dir_name)
    }

    /// Declare a backing store in a project
    pub fn add_resource(&self, dir_name: &str, name: &str, kind: &str) {
        self.create_file(
            &format!("{dir_name}/config/databases/{name}.yaml"),
            &format!("name: {name}\ntype: {kind}\n"),
        );
    }

    /// A local runtime bridge jar to pin
    pub fn bridge_jar(&self) -> PathBuf {
        self.create_file("engine/local-engine.jar", "bridge");
        self.dir.path().join("engine/local-engine.jar")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiler that writes a stub jar, optionally after a delay or failing
#[derive(Debug, Default)]
pub struct FakeCompiler {
    /// Per project directory name delays
    pub delays: HashMap<String, Duration>,
    /// Project directory names whose build fails
    pub failing: HashSet<String>,
    /// Every project directory compiled, in call order
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, dir_name: &str, delay: Duration) -> Self {
        self.delays.insert(dir_name.to_string(), delay);
        self
    }

    pub fn failing_for(mut self, dir_name: &str) -> Self {
        self.failing.insert(dir_name.to_string());
        self
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl ProjectCompiler for FakeCompiler {
    async fn compile(&self, project_dir: &Path) -> Result<PathBuf, TaskError> {
        self.calls.lock().unwrap().push(project_dir.to_path_buf());
        let name = dir_name(project_dir);
        if let Some(delay) = self.delays.get(&name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&name) {
            return Err(TaskError::ExternalBuildFailed {
                message: format!("compilation of {name} failed"),
            });
        }
        let jar = project_dir.join(format!("build/libs/{name}-all.jar"));
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"compiled").unwrap();
        Ok(jar)
    }
}

/// What the fake image builder saw for one build
#[derive(Debug, Clone)]
pub struct RecordedImage {
    /// Tags requested
    pub tags: Vec<String>,
    /// Files in the build context, relative and sorted
    pub files: Vec<String>,
    /// Generated image descriptor
    pub dockerfile: String,
    /// Identity marker content
    pub marker: Option<String>,
    /// Proxy fragment content
    pub proxy_config: Option<String>,
}

/// Image builder that records the build context instead of building
#[derive(Debug, Default)]
pub struct FakeImageBuilder {
    pub images: Mutex<Vec<RecordedImage>>,
}

impl FakeImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<RecordedImage> {
        self.images.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBuilder for FakeImageBuilder {
    async fn build_image(&self, context_dir: &Path, tags: &[String]) -> Result<(), TaskError> {
        let mut files: Vec<String> = walkdir::WalkDir::new(context_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(context_dir)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        files.sort();

        let read = |name: &str| std::fs::read_to_string(context_dir.join(name)).ok();
        self.images.lock().unwrap().push(RecordedImage {
            tags: tags.to_vec(),
            files,
            dockerfile: read("Dockerfile").unwrap_or_default(),
            marker: read("server/.mineplex-common-name"),
            proxy_config: read("config/paper-global.yml"),
        });
        Ok(())
    }
}

/// Batch configuration pinned to a local bridge, isolated from the environment
pub fn test_config(bridge: &Path) -> BuildConfig {
    BuildConfig::new()
        .with_bridge(BridgeSource {
            pinned: Some(bridge.to_path_buf()),
            local_build_dir: None,
            cache_path: None,
        })
        .with_secrets(SecretValues::new().without_env())
}

/// Build Task over fakes
pub fn fake_task(
    config: BuildConfig,
    compiler: Arc<FakeCompiler>,
    images: Arc<FakeImageBuilder>,
) -> BuildTask {
    BuildTask::new(
        Arc::new(config),
        Arc::new(ArtifactResolver::new(ArtifactCatalog::default())),
        compiler,
        images,
    )
}
