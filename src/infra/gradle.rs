//! External project build through the Gradle wrapper
//!
//! Runs the project's own wrapper and picks the produced plugin jar. The
//! time budget is enforced by the caller; the child process is killed when
//! the build future is dropped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::core::task::ProjectCompiler;
use crate::error::TaskError;

/// Gradle task producing the deployable plugin jar
pub const BUILD_TASK: &str = "buildPluginJar";

/// Where the wrapper puts built jars, relative to the project
const LIBS_DIR: &str = "build/libs";

/// Secondary output directory some projects use
const FALLBACK_DIR: &str = "mineplex";

/// Project compiler backed by `gradlew`
#[derive(Debug, Clone)]
pub struct GradleCompiler {
    task: String,
}

impl GradleCompiler {
    /// Compiler running the default task
    pub fn new() -> Self {
        Self {
            task: BUILD_TASK.to_string(),
        }
    }

    /// Run a different Gradle task
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }
}

impl Default for GradleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// The wrapper script of a project, preferring the platform's flavour
pub fn find_wrapper(project_dir: &Path) -> Option<PathBuf> {
    let names = if cfg!(windows) {
        ["gradlew.bat", "gradlew"]
    } else {
        ["gradlew", "gradlew.bat"]
    };
    names
        .iter()
        .map(|name| project_dir.join(name))
        .find(|path| path.is_file())
}

/// The jar a build produced.
///
/// Prefers a shaded `*-all.jar` in `build/libs`, then any other jar there,
/// then the first jar in the fallback directory. Source and doc bundles are
/// never picked.
pub fn find_built_jar(project_dir: &Path) -> Option<PathBuf> {
    let libs = jars_in(&project_dir.join(LIBS_DIR));
    libs.iter()
        .find(|p| file_name(p).ends_with("-all.jar"))
        .or_else(|| libs.first())
        .cloned()
        .or_else(|| jars_in(&project_dir.join(FALLBACK_DIR)).into_iter().next())
}

fn jars_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut jars: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = file_name(p);
            name.ends_with(".jar") && !name.contains("sources") && !name.contains("javadoc")
        })
        .collect();
    jars.sort();
    jars
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

#[async_trait]
impl ProjectCompiler for GradleCompiler {
    async fn compile(&self, project_dir: &Path) -> Result<PathBuf, TaskError> {
        let wrapper = find_wrapper(project_dir).ok_or_else(|| TaskError::ExternalBuildFailed {
            message: format!("gradlew not found in {}", project_dir.display()),
        })?;
        tracing::debug!("{} {}", wrapper.display(), self.task);

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&wrapper);
            cmd
        } else {
            Command::new(&wrapper)
        };
        let output = cmd
            .arg(&self.task)
            .current_dir(project_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TaskError::ExternalBuildFailed {
                message: format!("failed to run {}: {e}", wrapper.display()),
            })?;

        if !output.status.success() {
            return Err(TaskError::ExternalBuildFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        find_built_jar(project_dir).ok_or_else(|| TaskError::ExternalBuildFailed {
            message: "could not find built jar".to_string(),
        })
    }
}
