//! Topology state
//!
//! Typed model of the multi-service description file. Entries on the
//! infrastructure allow-list are kept as opaque YAML and round-tripped
//! without interpretation; everything this tool generates is a
//! [`ServiceSpec`].

use serde::{Deserialize, Serialize};
use serde_yml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::defaults;
use crate::error::{PersistError, TopologyError};
use crate::infra::filesystem;

/// Labels attached to generated services
pub mod labels {
    /// Project identifier
    pub const PROJECT_ID: &str = "io.gamestack.project.id";
    /// Game name
    pub const PROJECT_NAME: &str = "io.gamestack.project.name";
    /// Display name
    pub const DISPLAY_NAME: &str = "io.gamestack.project.display_name";
    /// Published game port
    pub const PORT: &str = "io.gamestack.project.port";
    /// Container name announced to the runtime
    pub const CONTAINER_NAME: &str = "io.gamestack.container.name";
    /// Namespace identifier
    pub const NAMESPACE_ID: &str = "io.gamestack.namespace.id";
    /// Listing visibility
    pub const VISIBILITY: &str = "io.gamestack.game.visibility";
    /// Game category
    pub const CATEGORY: &str = "io.gamestack.game.category";
    /// Declared resource instance name
    pub const RESOURCE_NAME: &str = "io.gamestack.resource.name";
    /// Resource store kind
    pub const RESOURCE_KIND: &str = "io.gamestack.resource.kind";
    /// Project that declared the resource
    pub const RESOURCE_PROJECT: &str = "io.gamestack.resource.project";
}

/// Long-syntax port publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Container port
    pub target: u16,
    /// Host port
    pub published: u16,
    /// Transport protocol
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Publication mode
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_mode() -> String {
    "ingress".to_string()
}

impl PortMapping {
    /// TCP ingress publication of `target` on `published`
    pub fn tcp(target: u16, published: u16) -> Self {
        Self {
            target,
            published,
            protocol: default_protocol(),
            mode: default_mode(),
        }
    }
}

/// Container health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Probe command
    pub test: Vec<String>,
    /// Time between probes
    pub interval: String,
    /// Probe timeout
    pub timeout: String,
    /// Failed probes before the container is unhealthy
    pub retries: u32,
    /// Grace period after start
    pub start_period: String,
}

impl HealthCheck {
    /// Poll the server log for the ready marker
    pub fn ready_marker() -> Self {
        Self {
            test: vec![
                "CMD-SHELL".to_string(),
                format!(
                    "grep -q '{}' /data/logs/latest.log",
                    defaults::READY_LOG_MARKER
                ),
            ],
            interval: "10s".to_string(),
            timeout: "5s".to_string(),
            retries: 30,
            start_period: "120s".to_string(),
        }
    }
}

/// Restart behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// When to restart
    pub condition: String,
    /// Delay between attempts
    pub delay: String,
    /// Attempts before giving up
    pub max_attempts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            condition: "on-failure".to_string(),
            delay: defaults::RESTART_DELAY.to_string(),
            max_attempts: defaults::RESTART_MAX_ATTEMPTS,
        }
    }
}

/// Deployment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deploy {
    /// Replica count
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// Restart behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
}

fn default_replicas() -> u32 {
    1
}

impl Default for Deploy {
    fn default() -> Self {
        Self {
            replicas: 1,
            restart_policy: Some(RestartPolicy::default()),
        }
    }
}

/// A generated service entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    /// Image reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Published ports
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortMapping>,
    /// Environment
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Named volume mounts (`volume:path`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Networks joined
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    /// Services started first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Health probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheck>,
    /// Deployment settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,
    /// Labels
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ServiceSpec {
    /// Label value, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A managed project service found in a persisted topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedProject {
    /// Service key
    pub service: String,
    /// Project identifier
    pub project_id: String,
    /// Published game port
    pub port: u16,
    /// Game name
    pub name: Option<String>,
}

/// In-memory topology
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopologyState {
    /// Format version
    pub version: String,
    /// Infrastructure entries, in file order, never interpreted
    pub preserved: Mapping,
    /// Generated entries
    pub managed: BTreeMap<String, ServiceSpec>,
    /// Network definitions
    pub networks: Mapping,
    /// Volume definitions
    pub volumes: Mapping,
    /// Other top-level keys, round-tripped
    pub extra: Mapping,
}

const SECTION_KEYS: &[&str] = &["version", "services", "networks", "volumes"];

impl TopologyState {
    /// Empty topology with the default format version
    pub fn new() -> Self {
        Self {
            version: defaults::COMPOSE_VERSION.to_string(),
            ..Self::default()
        }
    }

    /// Load a topology file; `Ok(None)` when it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, TopologyError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| TopologyError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content, path).map(Some)
    }

    /// Decode a topology document; `path` is only used in error messages
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, TopologyError> {
        let parse_err = |error: String| TopologyError::Parse {
            path: path.to_path_buf(),
            error,
        };

        let root = match serde_yml::from_str::<Value>(content).map_err(|e| parse_err(e.to_string()))? {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map,
            _ => return Err(parse_err("top level is not a mapping".to_string())),
        };

        let mut state = Self::new();
        for (key, value) in root {
            match key.as_str() {
                Some("version") => {
                    state.version = match value {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        _ => return Err(parse_err("'version' is not a string".to_string())),
                    };
                }
                Some("services") => {
                    for (name, service) in section(value, "services").map_err(parse_err)? {
                        state.insert_loaded_service(name, service);
                    }
                }
                Some("networks") => state.networks = section(value, "networks").map_err(parse_err)?,
                Some("volumes") => state.volumes = section(value, "volumes").map_err(parse_err)?,
                _ => {
                    state.extra.insert(key, value);
                }
            }
        }
        Ok(state)
    }

    fn insert_loaded_service(&mut self, name: Value, service: Value) {
        let Some(key) = name.as_str().map(ToOwned::to_owned) else {
            tracing::warn!("Dropping service with non-string name");
            return;
        };

        if is_preserved(&key) {
            self.preserved.insert(name, service);
            return;
        }
        match serde_yml::from_value::<ServiceSpec>(service) {
            Ok(spec) => {
                self.managed.insert(key, spec);
            }
            Err(e) => tracing::warn!("Dropping unrecognized service '{key}': {e}"),
        }
    }

    /// Render as a YAML document
    pub fn to_value(&self) -> Result<Value, serde_yml::Error> {
        let mut services = self.preserved.clone();
        for (name, spec) in &self.managed {
            services.insert(Value::from(name.as_str()), serde_yml::to_value(spec)?);
        }

        let mut root = Mapping::new();
        root.insert(Value::from("version"), Value::from(self.version.as_str()));
        root.insert(Value::from("services"), Value::Mapping(services));
        root.insert(Value::from("networks"), Value::Mapping(self.networks.clone()));
        if !self.volumes.is_empty() {
            root.insert(Value::from("volumes"), Value::Mapping(self.volumes.clone()));
        }
        for (key, value) in &self.extra {
            if !key.as_str().is_some_and(|k| SECTION_KEYS.contains(&k)) {
                root.insert(key.clone(), value.clone());
            }
        }
        Ok(Value::Mapping(root))
    }

    /// Render as YAML text
    pub fn to_yaml(&self) -> Result<String, serde_yml::Error> {
        serde_yml::to_string(&self.to_value()?)
    }

    /// Persist atomically; the previous file survives any failure
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let content = self.to_yaml().map_err(|e| PersistError::Serialize {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        filesystem::write_atomic(path, &content)
    }

    /// Managed services that carry project labels
    pub fn managed_projects(&self) -> Vec<ManagedProject> {
        self.managed
            .iter()
            .filter_map(|(service, spec)| {
                let project_id = spec.label(labels::PROJECT_ID)?;
                let port = spec
                    .label(labels::PORT)
                    .and_then(|p| p.parse().ok())
                    .or_else(|| spec.ports.first().map(|p| p.published))?;
                Some(ManagedProject {
                    service: service.clone(),
                    project_id: project_id.to_string(),
                    port,
                    name: spec.label(labels::PROJECT_NAME).map(ToOwned::to_owned),
                })
            })
            .collect()
    }

    /// Names of the preserved entries, in file order
    pub fn preserved_names(&self) -> Vec<String> {
        self.preserved
            .keys()
            .filter_map(|k| k.as_str().map(ToOwned::to_owned))
            .collect()
    }
}

/// Whether a service name is on the infrastructure allow-list
pub fn is_preserved(name: &str) -> bool {
    defaults::PRESERVED_SERVICES.contains(&name)
}

fn section(value: Value, name: &str) -> Result<Mapping, String> {
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        _ => Err(format!("'{name}' is not a mapping")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PRIOR: &str = r#"
version: '3.8'
x-common: &common
  restart: always
services:
  kafka:
    image: bitnami/kafka:3
    environment:
      - KAFKA_CFG_NODE_ID=0
    ports: ["9092:9092"]
  old-game:
    image: local-minecraft-old:latest
    labels:
      io.gamestack.project.id: old
      io.gamestack.project.port: "25566"
  hand-written:
    image: nginx
    ports: ["80:80"]
networks:
  local-docker-network:
    driver: overlay
volumes:
  db-stats-data: {}
"#;

    #[test]
    fn test_partition_on_load() {
        let state = TopologyState::from_yaml(PRIOR, Path::new("c.yml")).unwrap();
        assert_eq!(state.version, "3.8");
        assert_eq!(state.preserved_names(), vec!["kafka"]);
        assert!(state.managed.contains_key("old-game"));
        assert!(!state.managed.contains_key("hand-written"));
        assert!(state.extra.contains_key("x-common"));
        assert_eq!(state.volumes.len(), 1);
    }

    #[test]
    fn test_managed_projects_from_labels() {
        let state = TopologyState::from_yaml(PRIOR, Path::new("c.yml")).unwrap();
        let projects = state.managed_projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].project_id, "old");
        assert_eq!(projects[0].port, 25566);
    }

    #[test]
    fn test_preserved_entry_round_trip() {
        let state = TopologyState::from_yaml(PRIOR, Path::new("c.yml")).unwrap();
        let reparsed = TopologyState::from_yaml(&state.to_yaml().unwrap(), Path::new("c.yml")).unwrap();

        let before: Value = serde_yml::from_str(PRIOR).unwrap();
        assert_eq!(reparsed.preserved.get("kafka"), before["services"].get("kafka"));
    }

    #[test]
    fn test_section_order() {
        let mut state = TopologyState::new();
        state.managed.insert("alpha".to_string(), ServiceSpec::default());
        let yaml = state.to_yaml().unwrap();
        let version = yaml.find("version").unwrap();
        let services = yaml.find("services").unwrap();
        let networks = yaml.find("networks").unwrap();
        assert!(version < services && services < networks);
        assert!(!yaml.contains("volumes"));
    }

    #[test]
    fn test_rejects_non_mapping_services() {
        let err = TopologyState::from_yaml("services: [a, b]\n", Path::new("c.yml")).unwrap_err();
        assert!(matches!(err, TopologyError::Parse { .. }));
    }

    #[test]
    fn test_empty_document() {
        let state = TopologyState::from_yaml("", Path::new("c.yml")).unwrap();
        assert_eq!(state.version, defaults::COMPOSE_VERSION);
        assert!(state.managed.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(TopologyState::load(&temp.path().join("none.yml")).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docker-compose.yml");
        let mut state = TopologyState::new();
        state.managed.insert(
            "alpha".to_string(),
            ServiceSpec {
                image: Some("local-minecraft-alpha:latest".to_string()),
                ports: vec![PortMapping::tcp(25565, 25565)],
                healthcheck: Some(HealthCheck::ready_marker()),
                deploy: Some(Deploy::default()),
                ..ServiceSpec::default()
            },
        );
        state.save(&path).unwrap();

        let loaded = TopologyState::load(&path).unwrap().unwrap();
        assert_eq!(loaded.managed, state.managed);
    }
}
