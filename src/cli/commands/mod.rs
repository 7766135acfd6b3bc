//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod console;
pub mod list;
pub mod rebuild;

use anyhow::Result;
use clap::Subcommand;
use std::path::{Path, PathBuf};

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build projects into images and merge them into the topology
    Build {
        /// Project directories
        #[arg(required = true)]
        projects: Vec<PathBuf>,

        /// Use this runtime bridge jar instead of any other source
        #[arg(long, value_name = "JAR")]
        local_engine: Option<PathBuf>,

        /// Directory of fresh local runtime bridge builds
        #[arg(long, value_name = "DIR")]
        local_engine_build: Option<PathBuf>,

        /// Deploy the topology after a successful build
        #[arg(long)]
        deploy: bool,

        /// Deploy with compose instead of a swarm stack
        #[arg(long, requires = "deploy")]
        compose: bool,
    },

    /// Rebuild the projects already in the topology on their current ports
    Rebuild {
        /// Only rebuild these project ids
        projects: Vec<String>,

        /// Use this runtime bridge jar instead of any other source
        #[arg(long, value_name = "JAR")]
        local_engine: Option<PathBuf>,

        /// Redeploy the topology after rebuilding
        #[arg(long)]
        deploy: bool,

        /// Deploy with compose instead of a swarm stack
        #[arg(long, requires = "deploy")]
        compose: bool,
    },

    /// Show managed services, preserved entries and known projects
    List,

    /// Run a console command on a running game server
    Command {
        /// Project id, service key or part of either
        service: String,

        /// Console command, without the leading slash
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

impl Commands {
    /// Execute the command against the workspace in `workspace_dir`
    pub async fn run(self, workspace_dir: &Path) -> Result<()> {
        match self {
            Self::Build {
                projects,
                local_engine,
                local_engine_build,
                deploy,
                compose,
            } => {
                let options = build::BuildOptions {
                    projects,
                    local_engine,
                    local_engine_build,
                    deploy,
                    compose,
                };
                build::execute(workspace_dir, options).await
            }
            Self::Rebuild {
                projects,
                local_engine,
                deploy,
                compose,
            } => {
                let options = rebuild::RebuildOptions {
                    projects,
                    local_engine,
                    deploy,
                    compose,
                };
                rebuild::execute(workspace_dir, options).await
            }
            Self::List => list::execute(workspace_dir).await,
            Self::Command { service, command } => console::execute(&service, &command).await,
        }
    }
}
