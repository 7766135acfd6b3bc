//! Platform-specific directory management
//!
//! Provides the cache directory used to keep the last downloaded runtime
//! bridge. `GAMESTACK_CACHE_DIR` overrides the platform default.

use std::env;
use std::path::PathBuf;

use crate::config::defaults;

/// Environment variable overriding the cache directory
pub const ENV_CACHE_DIR: &str = "GAMESTACK_CACHE_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "gamestack";

/// Subdirectory holding downloaded runtime bridges
const BRIDGE_SUBDIR: &str = "bridge";

/// Platform-specific directory provider for gamestack
#[derive(Debug, Clone)]
pub struct GamestackDirs {
    cache_dir: PathBuf,
}

impl GamestackDirs {
    /// Create a new `GamestackDirs` instance
    ///
    /// Checks the environment first, then falls back to platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: Self::resolve_cache_dir(),
        }
    }

    /// Use an explicit cache directory
    #[must_use]
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Get the cache directory path
    ///
    /// - Linux: `$XDG_CACHE_HOME/gamestack` or `~/.cache/gamestack`
    /// - macOS: `~/Library/Caches/gamestack`
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Cached copy of the last upstream runtime bridge
    #[must_use]
    pub fn bridge_cache_path(&self) -> PathBuf {
        self.cache_dir
            .join(BRIDGE_SUBDIR)
            .join(defaults::BRIDGE_FILE_NAME)
    }

    fn resolve_cache_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_CACHE_DIR) {
            return PathBuf::from(path);
        }

        dirs::cache_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                // Fallback to home directory
                dirs::home_dir()
                    .map(|h| h.join(".cache").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".cache").join(APP_NAME))
            })
    }
}

impl Default for GamestackDirs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_new_creates_instance() {
        let dirs = GamestackDirs::new();
        assert!(!dirs.cache_dir().as_os_str().is_empty());
    }

    #[test]
    fn test_bridge_cache_is_under_cache_dir() {
        let dirs = GamestackDirs::with_cache_dir("/tmp/gs-cache");
        assert_eq!(
            dirs.bridge_cache_path(),
            PathBuf::from("/tmp/gs-cache/bridge/local-engine.jar")
        );
    }
}
