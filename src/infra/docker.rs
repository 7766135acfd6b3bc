//! Container engine adapter
//!
//! Builds project images, deploys the topology and talks to the console of
//! running game servers with the Docker or Podman CLI.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::config::defaults;
use crate::core::sanitize::sanitize_name;
use crate::core::task::ImageBuilder;
use crate::core::topology::labels;
use crate::error::{ConsoleError, TaskError};

/// Container runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// Docker container runtime
    Docker,
    /// Podman container runtime
    Podman,
}

impl ContainerRuntime {
    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }

    /// First runtime found in `PATH`, Docker preferred
    pub fn detect() -> Option<Self> {
        [Self::Docker, Self::Podman]
            .into_iter()
            .find(|runtime| which::which(runtime.command()).is_ok())
    }
}

/// Arguments for building the current directory under `tags`.
///
/// The cache is bypassed so a freshly copied artifact is always picked up.
pub fn build_args(tags: &[String]) -> Vec<String> {
    let mut args = vec!["build".to_string(), "--no-cache".to_string()];
    for tag in tags {
        args.push("-t".to_string());
        args.push(tag.clone());
    }
    args.push(".".to_string());
    args
}

async fn run(
    runtime: ContainerRuntime,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<String, String> {
    tracing::debug!("{} {}", runtime.command(), args.join(" "));

    let mut cmd = Command::new(runtime.command());
    cmd.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("failed to run {}: {e}", runtime.command()))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

/// Image builder backed by the container CLI
#[derive(Debug, Clone)]
pub struct DockerImageBuilder {
    runtime: ContainerRuntime,
}

impl DockerImageBuilder {
    /// Create a builder for `runtime`
    pub fn new(runtime: ContainerRuntime) -> Self {
        Self { runtime }
    }

    /// Create a builder for the runtime found in `PATH`
    pub fn detect() -> Option<Self> {
        ContainerRuntime::detect().map(Self::new)
    }

    /// Runtime in use
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    async fn build_image(&self, context_dir: &Path, tags: &[String]) -> Result<(), TaskError> {
        run(self.runtime, &build_args(tags), Some(context_dir))
            .await
            .map(|_| ())
            .map_err(|message| TaskError::ExternalBuildFailed {
                message: format!("image build failed: {message}"),
            })
    }
}

/// How the topology is brought up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Swarm stack deploy
    Stack,
    /// Single-node compose up
    Compose,
}

/// Deploys a topology file
#[derive(Debug, Clone)]
pub struct Deployer {
    runtime: ContainerRuntime,
    mode: DeployMode,
    stack_name: String,
}

impl Deployer {
    /// Create a deployer
    pub fn new(runtime: ContainerRuntime, mode: DeployMode, stack_name: impl Into<String>) -> Self {
        Self {
            runtime,
            mode,
            stack_name: stack_name.into(),
        }
    }

    /// Stack name
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// Arguments for deploying `topology`
    pub fn deploy_args(&self, topology: &Path) -> Vec<String> {
        let file = topology.display().to_string();
        match self.mode {
            DeployMode::Stack => vec![
                "stack".to_string(),
                "deploy".to_string(),
                "-c".to_string(),
                file,
                self.stack_name.clone(),
            ],
            DeployMode::Compose => vec![
                "compose".to_string(),
                "-f".to_string(),
                file,
                "-p".to_string(),
                self.stack_name.clone(),
                "up".to_string(),
                "-d".to_string(),
            ],
        }
    }

    /// Make sure the swarm is active; failures are logged, not fatal
    pub async fn ensure_swarm(&self) {
        let state_args = [
            "info".to_string(),
            "--format".to_string(),
            "{{.Swarm.LocalNodeState}}".to_string(),
        ];
        match run(self.runtime, &state_args, None).await {
            Ok(state) if state == "active" => tracing::info!("Swarm already active"),
            Ok(_) => {
                let init_args = ["swarm".to_string(), "init".to_string()];
                match run(self.runtime, &init_args, None).await {
                    Ok(_) => tracing::info!("Swarm initialized"),
                    Err(e) => tracing::warn!("Failed to initialize swarm: {e}"),
                }
            }
            Err(e) => tracing::warn!("Failed to check swarm state: {e}"),
        }
    }

    /// Deploy `topology`
    pub async fn deploy(&self, topology: &Path) -> Result<(), TaskError> {
        if self.mode == DeployMode::Stack {
            self.ensure_swarm().await;
        }
        let cwd: Option<PathBuf> = topology.parent().map(Path::to_path_buf);
        run(self.runtime, &self.deploy_args(topology), cwd.as_deref())
            .await
            .map(|_| ())
            .map_err(|message| TaskError::ExternalBuildFailed {
                message: format!("deploy failed: {message}"),
            })
    }
}

/// A running game-server container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningServer {
    /// Container name
    pub container: String,
    /// Project the container was built from
    pub project_id: String,
}

/// What the console did with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleReply {
    /// Executed over RCON, with whatever the server printed
    Output(String),
    /// RCON unavailable; written to the server's command file
    Queued,
}

/// Parse `ps` output of [`ServerConsole::list_args`]
pub fn parse_servers(stdout: &str) -> Vec<RunningServer> {
    let mut servers: Vec<RunningServer> = stdout
        .lines()
        .filter_map(|line| {
            let (container, project_id) = line.trim().split_once('\t')?;
            if container.is_empty() || project_id.is_empty() {
                return None;
            }
            Some(RunningServer {
                container: container.to_string(),
                project_id: project_id.to_string(),
            })
        })
        .collect();
    servers.sort_by(|a, b| {
        a.project_id
            .cmp(&b.project_id)
            .then_with(|| a.container.cmp(&b.container))
    });
    servers
}

/// Pick the server for `query`.
///
/// An exact project id or service key wins; otherwise the first server
/// whose project id or container name contains `query`, ignoring case.
pub fn select_server<'a>(
    servers: &'a [RunningServer],
    query: &str,
) -> Result<&'a RunningServer, ConsoleError> {
    let needle = query.to_ascii_lowercase();
    servers
        .iter()
        .find(|s| s.project_id == query || sanitize_name(&s.project_id) == needle)
        .or_else(|| {
            servers.iter().find(|s| {
                s.project_id.to_ascii_lowercase().contains(&needle)
                    || s.container.to_ascii_lowercase().contains(&needle)
            })
        })
        .ok_or_else(|| ConsoleError::NotFound {
            query: query.to_string(),
            available: servers.iter().map(|s| s.project_id.clone()).collect(),
        })
}

fn rcon_missing(stderr: &str) -> bool {
    stderr.contains("rcon-cli") && stderr.contains("not found")
}

/// Sends commands to the console of running game servers.
///
/// Game containers are found by their project label, so infrastructure
/// services never match. Works the same for stack and compose deployments.
#[derive(Debug, Clone)]
pub struct ServerConsole {
    runtime: ContainerRuntime,
    timeout: Duration,
}

impl ServerConsole {
    /// Create a console client
    pub fn new(runtime: ContainerRuntime) -> Self {
        Self {
            runtime,
            timeout: Duration::from_secs(defaults::CONSOLE_TIMEOUT_SECS),
        }
    }

    /// Bound every console call by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments listing labelled game-server containers
    pub fn list_args() -> Vec<String> {
        vec![
            "ps".to_string(),
            "--filter".to_string(),
            format!("label={}", labels::PROJECT_ID),
            "--format".to_string(),
            format!("{{{{.Names}}}}\t{{{{.Label \"{}\"}}}}", labels::PROJECT_ID),
        ]
    }

    /// Arguments running `command` through the server's RCON client
    pub fn exec_args(container: &str, command: &str) -> Vec<String> {
        vec![
            "exec".to_string(),
            container.to_string(),
            "rcon-cli".to_string(),
            command.to_string(),
        ]
    }

    /// Arguments appending `command` to the server's command file.
    ///
    /// The command is passed as a positional parameter, never spliced into
    /// the script.
    pub fn queue_args(container: &str, command: &str) -> Vec<String> {
        vec![
            "exec".to_string(),
            container.to_string(),
            "sh".to_string(),
            "-c".to_string(),
            format!("printf '%s\\n' \"$1\" >> {}", defaults::CONSOLE_COMMAND_FILE),
            "sh".to_string(),
            command.to_string(),
        ]
    }

    /// Running game servers, sorted by project id
    pub async fn running(&self) -> Result<Vec<RunningServer>, ConsoleError> {
        let stdout = run(self.runtime, &Self::list_args(), None)
            .await
            .map_err(|message| ConsoleError::Query { message })?;
        Ok(parse_servers(&stdout))
    }

    /// Send `command` to the console of `container`
    pub async fn send(&self, container: &str, command: &str) -> Result<ConsoleReply, ConsoleError> {
        match self.bounded(container, &Self::exec_args(container, command)).await? {
            Ok(output) => Ok(ConsoleReply::Output(output)),
            Err(stderr) if rcon_missing(&stderr) => {
                tracing::debug!("rcon-cli unavailable in {container}, queueing command");
                self.bounded(container, &Self::queue_args(container, command))
                    .await?
                    .map(|_| ConsoleReply::Queued)
                    .map_err(|message| ConsoleError::Failed {
                        container: container.to_string(),
                        message,
                    })
            }
            Err(message) => Err(ConsoleError::Failed {
                container: container.to_string(),
                message,
            }),
        }
    }

    async fn bounded(
        &self,
        container: &str,
        args: &[String],
    ) -> Result<Result<String, String>, ConsoleError> {
        tokio::time::timeout(self.timeout, run(self.runtime, args, None))
            .await
            .map_err(|_| ConsoleError::Timeout {
                container: container.to_string(),
                secs: self.timeout.as_secs(),
            })
    }
}
