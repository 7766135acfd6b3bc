//! Project-path registry
//!
//! Remembers where each successfully built project lives so a later
//! `rebuild` can find it without being told again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, PersistError};
use crate::infra::filesystem;

/// One registered project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLocation {
    /// Project source directory
    pub path: PathBuf,
    /// Human-facing name
    pub name: String,
}

/// Project identifier to location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectPathRegistry {
    entries: BTreeMap<String, ProjectLocation>,
}

impl ProjectPathRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry; an absent file is an empty registry
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Persist atomically
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| PersistError::Serialize {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        filesystem::write_atomic(path, &content)
    }

    /// Add or replace a project; other entries are kept
    pub fn upsert(
        &mut self,
        project_id: impl Into<String>,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
    ) {
        self.entries.insert(
            project_id.into(),
            ProjectLocation {
                path: path.into(),
                name: name.into(),
            },
        );
    }

    /// Location of a project
    pub fn get(&self, project_id: &str) -> Option<&ProjectLocation> {
        self.entries.get(project_id)
    }

    /// Every registered project, by identifier
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProjectLocation)> {
        self.entries.iter().map(|(id, loc)| (id.as_str(), loc))
    }

    /// Number of registered projects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no project is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
