//! Secret environment values
//!
//! Declared secret keys are filled from the workspace configuration, then
//! the process environment, then a placeholder. There is no prompting.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::defaults;

/// Secret values supplied per project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretValues {
    per_project: BTreeMap<String, BTreeMap<String, String>>,
    read_env: bool,
}

impl SecretValues {
    /// No configured values; the process environment is consulted
    pub fn new() -> Self {
        Self {
            per_project: BTreeMap::new(),
            read_env: true,
        }
    }

    /// Use configured values keyed by project id
    #[must_use]
    pub fn with_values(mut self, values: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        self.per_project = values;
        self
    }

    /// Add one configured value
    #[must_use]
    pub fn with_value(
        mut self,
        project_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.per_project
            .entry(project_id.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Do not fall back to the process environment
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Resolve every declared key of a project
    pub fn resolve(&self, project_id: &str, keys: &BTreeSet<String>) -> BTreeMap<String, String> {
        let configured = self.per_project.get(project_id);
        keys.iter()
            .map(|key| {
                let value = configured
                    .and_then(|values| values.get(key).cloned())
                    .or_else(|| {
                        self.read_env
                            .then(|| std::env::var(key).ok())
                            .flatten()
                    })
                    .unwrap_or_else(|| {
                        tracing::warn!(
                            "No value for secret {key} of {project_id}, using '{}'",
                            defaults::UNSET_SECRET
                        );
                        defaults::UNSET_SECRET.to_string()
                    });
                (key.clone(), value)
            })
            .collect()
    }
}
