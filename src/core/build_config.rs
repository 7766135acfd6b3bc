//! Immutable batch configuration
//!
//! Built once from command-line flags and the workspace configuration before
//! a batch starts, then shared read-only by every Build Task.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::defaults;
use crate::core::secrets::SecretValues;
use crate::error::ConfigError;

/// Where the runtime bridge may come from, in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeSource {
    /// Explicit local override; always wins when set
    pub pinned: Option<PathBuf>,
    /// Directory holding freshly built copies of the bridge
    pub local_build_dir: Option<PathBuf>,
    /// Cached copy of the last upstream download
    pub cache_path: Option<PathBuf>,
}

/// Settings every Build Task of a batch reads
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Published game port of the first project
    pub base_port: u16,
    /// Published debug port of the first project
    pub debug_base_port: u16,
    /// Time budget for the external project build
    pub compile_timeout: Duration,
    /// Secret written into the proxy trust fragment
    pub forwarding_secret: String,
    /// Runtime bridge sources
    pub bridge: BridgeSource,
    /// Values for declared secret keys
    pub secrets: SecretValues,
    /// Parent directory for scratch workspaces (system temp dir when unset)
    pub scratch_root: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_port: defaults::BASE_GAME_PORT,
            debug_base_port: defaults::BASE_DEBUG_PORT,
            compile_timeout: Duration::from_secs(defaults::COMPILE_TIMEOUT_SECS),
            forwarding_secret: defaults::DEFAULT_FORWARDING_SECRET.to_string(),
            bridge: BridgeSource::default(),
            secrets: SecretValues::new(),
            scratch_root: None,
        }
    }
}

impl BuildConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base game and debug ports
    #[must_use]
    pub fn with_ports(mut self, base_port: u16, debug_base_port: u16) -> Self {
        self.base_port = base_port;
        self.debug_base_port = debug_base_port;
        self
    }

    /// Set the external build time budget
    #[must_use]
    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    /// Set the proxy forwarding secret
    #[must_use]
    pub fn with_forwarding_secret(mut self, secret: impl Into<String>) -> Self {
        self.forwarding_secret = secret.into();
        self
    }

    /// Set the runtime bridge sources
    #[must_use]
    pub fn with_bridge(mut self, bridge: BridgeSource) -> Self {
        self.bridge = bridge;
        self
    }

    /// Set the secret values
    #[must_use]
    pub fn with_secrets(mut self, secrets: SecretValues) -> Self {
        self.secrets = secrets;
        self
    }

    /// Create scratch workspaces under `root`
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Port reserved for the project at `index` of a batch.
    ///
    /// `None` when the game port or its paired debug port would run past
    /// the end of the port range.
    pub fn port_for_index(&self, index: usize) -> Option<u16> {
        let offset = u16::try_from(index).ok()?;
        self.debug_base_port.checked_add(offset)?;
        self.base_port.checked_add(offset)
    }

    /// Make sure a batch of `count` projects gets distinct ports
    pub fn check_port_window(&self, count: usize) -> Result<(), ConfigError> {
        match count.checked_sub(1) {
            Some(last) if self.port_for_index(last).is_none() => Err(ConfigError::PortRange {
                base_port: self.base_port,
                debug_base_port: self.debug_base_port,
                count,
            }),
            _ => Ok(()),
        }
    }
}
