//! Workspace configuration
//!
//! A workspace is the directory holding the topology file, the project-path
//! registry and an optional `gamestack.toml`:
//!
//! ```toml
//! [ports]
//! game = 25565
//! debug = 5005
//!
//! [bridge]
//! local_build_dir = "../local-engine/build/libs"
//!
//! [secrets.my-project]
//! API_KEY = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::defaults;
use crate::core::build_config::{BridgeSource, BuildConfig};
use crate::core::merge::MergeSettings;
use crate::core::secrets::SecretValues;
use crate::error::ConfigError;

/// Port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortsConfig {
    /// Published game port of the first project
    pub game: u16,
    /// Published debug port of the first project
    pub debug: u16,
    /// First resource port
    pub resource_base: u16,
    /// Number of resource ports
    pub resource_range: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            game: defaults::BASE_GAME_PORT,
            debug: defaults::BASE_DEBUG_PORT,
            resource_base: defaults::RESOURCE_BASE_PORT,
            resource_range: defaults::RESOURCE_PORT_RANGE,
        }
    }
}

/// Build settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    /// External build time budget in seconds
    pub compile_timeout: u64,
    /// Parent directory for scratch workspaces
    pub scratch_dir: Option<PathBuf>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            compile_timeout: defaults::COMPILE_TIMEOUT_SECS,
            scratch_dir: None,
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Stack name
    pub name: String,
    /// Shared network
    pub network: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: defaults::DEFAULT_STACK_NAME.to_string(),
            network: defaults::DEFAULT_NETWORK.to_string(),
        }
    }
}

/// Runtime bridge settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Pinned bridge jar
    pub path: Option<PathBuf>,
    /// Directory of fresh local builds
    pub local_build_dir: Option<PathBuf>,
}

/// Proxy trust settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Forwarding secret
    pub secret: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            secret: defaults::DEFAULT_FORWARDING_SECRET.to_string(),
        }
    }
}

/// Contents of `gamestack.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Port settings
    pub ports: PortsConfig,
    /// Build settings
    pub build: BuildSection,
    /// Deployment settings
    pub stack: StackConfig,
    /// Runtime bridge settings
    pub bridge: BridgeConfig,
    /// Proxy trust settings
    pub proxy: ProxyConfig,
    /// Secret values keyed by project id
    pub secrets: BTreeMap<String, BTreeMap<String, String>>,
}

impl WorkspaceConfig {
    /// Parse TOML content
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load from a file; an absent file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content, path)
    }
}

/// Overrides given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOverrides {
    /// Pinned bridge jar
    pub bridge_path: Option<PathBuf>,
    /// Directory of fresh local builds
    pub bridge_build_dir: Option<PathBuf>,
}

/// A workspace directory and its configuration
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
}

impl Workspace {
    /// Open a workspace, reading `gamestack.toml` when present
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config = WorkspaceConfig::load_from_path(&root.join(defaults::WORKSPACE_CONFIG_FILE))?;
        Ok(Self { root, config })
    }

    /// Workspace with an explicit configuration
    pub fn with_config(root: impl Into<PathBuf>, config: WorkspaceConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Workspace directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded configuration
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Topology file
    pub fn topology_path(&self) -> PathBuf {
        self.root.join(defaults::TOPOLOGY_FILE)
    }

    /// Project-path registry file
    pub fn project_paths_path(&self) -> PathBuf {
        self.root.join(defaults::PROJECT_PATHS_FILE)
    }

    /// Resolve a configured path against the workspace directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Batch configuration; command-line overrides win over the file
    pub fn build_config(
        &self,
        overrides: &BuildOverrides,
        bridge_cache: Option<PathBuf>,
    ) -> BuildConfig {
        let pinned = overrides
            .bridge_path
            .clone()
            .or_else(|| self.config.bridge.path.as_deref().map(|p| self.resolve(p)));
        let local_build_dir = overrides.bridge_build_dir.clone().or_else(|| {
            self.config
                .bridge
                .local_build_dir
                .as_deref()
                .map(|p| self.resolve(p))
        });

        let mut config = BuildConfig::new()
            .with_ports(self.config.ports.game, self.config.ports.debug)
            .with_compile_timeout(Duration::from_secs(self.config.build.compile_timeout))
            .with_forwarding_secret(self.config.proxy.secret.clone())
            .with_bridge(BridgeSource {
                pinned,
                local_build_dir,
                cache_path: bridge_cache,
            })
            .with_secrets(SecretValues::new().with_values(self.config.secrets.clone()));
        if let Some(scratch) = &self.config.build.scratch_dir {
            config = config.with_scratch_root(self.resolve(scratch));
        }
        config
    }

    /// Merge settings for this workspace
    pub fn merge_settings(&self) -> MergeSettings {
        let ports = &self.config.ports;
        MergeSettings::default()
            .with_network(self.config.stack.network.clone())
            .with_ports(ports.game, ports.debug)
            .with_resource_ports(ports.resource_base, ports.resource_range)
    }
}
