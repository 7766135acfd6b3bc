//! Topology merge
//!
//! Folds a batch of build results into the persisted topology. Preserved
//! infrastructure entries survive untouched, stale generated entries are
//! replaced wholesale, and resource instances get ports that depend only
//! on their declared name.

use serde::Serialize;
use serde_yml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::defaults;
use crate::core::descriptor::ResourceRequest;
use crate::core::sanitize::sanitize_name;
use crate::core::task::BuildResult;
use crate::core::topology::{
    labels, Deploy, HealthCheck, PortMapping, RestartPolicy, ServiceSpec, TopologyState,
};

/// Two projects declared a resource instance with the same name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    /// Resource service name
    pub service: String,
    /// Declared instance name
    pub name: String,
    /// Project whose declaration was used
    pub kept_project: String,
    /// Project whose declaration was skipped
    pub skipped_project: String,
}

/// A built project whose service key could not be claimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceClash {
    /// Contested service key
    pub service: String,
    /// Project left out of the topology
    pub project_id: String,
    /// Why the key could not be claimed
    pub reason: String,
}

/// Merged topology and what had to give way
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Topology to persist
    pub state: TopologyState,
    /// Resource declarations skipped in favour of an earlier one
    pub conflicts: Vec<MergeConflict>,
    /// Build results left out of the topology
    pub clashes: Vec<ServiceClash>,
}

/// Merge parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSettings {
    /// Shared network every service joins
    pub network: String,
    /// Base game port of the batch
    pub base_port: u16,
    /// Base debug port of the batch
    pub debug_base_port: u16,
    /// First resource port
    pub resource_base_port: u16,
    /// Number of resource ports hashed into
    pub resource_port_range: u16,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            network: defaults::DEFAULT_NETWORK.to_string(),
            base_port: defaults::BASE_GAME_PORT,
            debug_base_port: defaults::BASE_DEBUG_PORT,
            resource_base_port: defaults::RESOURCE_BASE_PORT,
            resource_port_range: defaults::RESOURCE_PORT_RANGE,
        }
    }
}

impl MergeSettings {
    /// Use different batch base ports
    #[must_use]
    pub fn with_ports(mut self, base_port: u16, debug_base_port: u16) -> Self {
        self.base_port = base_port;
        self.debug_base_port = debug_base_port;
        self
    }

    /// Use a different shared network
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Use a different resource port window
    #[must_use]
    pub fn with_resource_ports(mut self, base: u16, range: u16) -> Self {
        self.resource_base_port = base;
        self.resource_port_range = range;
        self
    }
}

/// Stable 64-bit hash of a name (first eight bytes of its SHA-256)
pub fn stable_hash(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Published port of a resource instance.
///
/// Distinct names can land on the same port; collisions are not searched for.
pub fn resource_port(name: &str, base: u16, range: u16) -> u16 {
    if range == 0 {
        return base;
    }
    let offset = stable_hash(name) % u64::from(range);
    u16::try_from(u64::from(base) + offset).unwrap_or(u16::MAX)
}

/// Topology service key of a resource instance
pub fn resource_service_name(name: &str) -> String {
    format!("db-{}", sanitize_name(name))
}

/// Every resource request of a batch, in project order
pub fn resource_requests(results: &[BuildResult]) -> Vec<ResourceRequest> {
    results
        .iter()
        .flat_map(|r| r.resources.iter().cloned())
        .collect()
}

/// Folds build results into a topology
#[derive(Debug, Clone, Default)]
pub struct TopologyMerger {
    settings: MergeSettings,
}

impl TopologyMerger {
    /// Create a merger
    pub fn new(settings: MergeSettings) -> Self {
        Self { settings }
    }

    /// Merge settings
    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Build the next topology from the prior one and this batch.
    ///
    /// A result whose service key is empty, preserved or already claimed by
    /// an earlier result is left out and reported in `clashes`; resources
    /// declared only by such results are left out with it.
    pub fn merge(
        &self,
        prior: Option<TopologyState>,
        results: &[BuildResult],
        resources: &[ResourceRequest],
    ) -> MergeOutcome {
        let prior = prior.unwrap_or_else(TopologyState::new);
        let stale = prior.managed.len();

        let mut state = TopologyState {
            version: prior.version,
            preserved: prior.preserved,
            managed: BTreeMap::new(),
            networks: prior.networks,
            volumes: prior.volumes,
            extra: prior.extra,
        };
        tracing::debug!(
            "Replacing {stale} generated service(s), keeping {} preserved",
            state.preserved.len()
        );

        let mut clashes = Vec::new();
        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        let mut accepted = Vec::new();
        for result in results {
            let service = result.service_name.as_str();
            let reason = if service.is_empty() {
                Some("project id has no usable characters".to_string())
            } else if state.preserved.contains_key(service) {
                Some("a preserved entry has that name".to_string())
            } else {
                owners.get(service).map(|owner| format!("already taken by {owner}"))
            };
            if let Some(reason) = reason {
                tracing::warn!("{}: service '{service}' unavailable ({reason}), skipping", result.project_id);
                clashes.push(ServiceClash {
                    service: service.to_string(),
                    project_id: result.project_id.clone(),
                    reason,
                });
                continue;
            }
            owners.insert(service, result.project_id.as_str());
            accepted.push(result);
        }

        let mut conflicts = Vec::new();
        let mut declared_by: BTreeMap<String, (String, String)> = BTreeMap::new();
        let requests = resources
            .iter()
            .filter(|r| accepted.iter().any(|a| a.project_id == r.project_id));
        for request in requests {
            let service = resource_service_name(&request.name);
            if let Some(owner) = owners.get(service.as_str()) {
                tracing::warn!(
                    "Resource '{}' of {} clashes with the service of {owner}, skipping",
                    request.name,
                    request.project_id
                );
                conflicts.push(MergeConflict {
                    service: service.clone(),
                    name: request.name.clone(),
                    kept_project: (*owner).to_string(),
                    skipped_project: request.project_id.clone(),
                });
                continue;
            }
            if let Some((kept_project, kept_name)) = declared_by.get(&service) {
                if *kept_project != request.project_id {
                    tracing::warn!(
                        "Resource '{}' of {} already declared by {kept_project}; keeping the first",
                        request.name,
                        request.project_id
                    );
                    conflicts.push(MergeConflict {
                        service: service.clone(),
                        name: kept_name.clone(),
                        kept_project: kept_project.clone(),
                        skipped_project: request.project_id.clone(),
                    });
                }
                continue;
            }
            if state.preserved.contains_key(service.as_str()) {
                tracing::warn!("Resource service '{service}' clashes with a preserved entry, skipping");
                continue;
            }

            let volume = format!("{service}-data");
            if !state.volumes.contains_key(volume.as_str()) {
                state
                    .volumes
                    .insert(Value::from(volume.as_str()), Value::Mapping(Mapping::new()));
            }
            state
                .managed
                .insert(service.clone(), self.resource_service(request, &volume));
            declared_by.insert(service, (request.project_id.clone(), request.name.clone()));
        }

        for result in accepted {
            let depends_on = result
                .resources
                .iter()
                .map(|r| resource_service_name(&r.name))
                .filter(|s| declared_by.contains_key(s))
                .collect();
            state
                .managed
                .insert(result.service_name.clone(), self.project_service(result, depends_on));
        }

        if !state.networks.contains_key(self.settings.network.as_str()) {
            let mut network = Mapping::new();
            network.insert(Value::from("driver"), Value::from("overlay"));
            network.insert(Value::from("attachable"), Value::Bool(true));
            state
                .networks
                .insert(Value::from(self.settings.network.as_str()), Value::Mapping(network));
        }

        MergeOutcome {
            state,
            conflicts,
            clashes,
        }
    }

    fn project_service(&self, result: &BuildResult, depends_on: Vec<String>) -> ServiceSpec {
        let port = result.assigned_port;
        let debug_port = self
            .settings
            .debug_base_port
            .saturating_add(port.saturating_sub(self.settings.base_port));

        let mut environment: BTreeMap<String, String> = defaults::RUNTIME_ENV
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        environment.insert("POD_NAME".to_string(), result.container_name.clone());
        environment.insert("MINEPLEX_PROJECT_ID".to_string(), result.project_id.clone());
        if let Some(namespace) = &result.namespace_id {
            environment.insert("MINEPLEX_NAMESPACE_ID".to_string(), namespace.clone());
        }
        environment.insert("MINEPLEX_ENVIRONMENT".to_string(), String::new());
        environment.insert("DEV_MODE".to_string(), "true".to_string());
        environment.extend(result.secret_vars.clone());

        let mut service_labels = BTreeMap::from([
            (labels::PROJECT_ID.to_string(), result.project_id.clone()),
            (labels::PROJECT_NAME.to_string(), result.game_name.clone()),
            (
                labels::DISPLAY_NAME.to_string(),
                result.display_name.clone().unwrap_or_default(),
            ),
            (labels::PORT.to_string(), port.to_string()),
            (labels::CONTAINER_NAME.to_string(), result.container_name.clone()),
        ]);
        let optional = [
            (labels::NAMESPACE_ID, &result.namespace_id),
            (labels::VISIBILITY, &result.metadata.visibility),
            (labels::CATEGORY, &result.metadata.category),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                service_labels.insert(key.to_string(), value.clone());
            }
        }

        ServiceSpec {
            image: Some(result.image_reference.clone()),
            ports: vec![
                PortMapping::tcp(defaults::CONTAINER_GAME_PORT, port),
                PortMapping::tcp(defaults::CONTAINER_DEBUG_PORT, debug_port),
            ],
            environment,
            volumes: Vec::new(),
            networks: vec![self.settings.network.clone()],
            depends_on,
            healthcheck: Some(HealthCheck::ready_marker()),
            deploy: Some(Deploy::default()),
            labels: service_labels,
        }
    }

    fn resource_service(&self, request: &ResourceRequest, volume: &str) -> ServiceSpec {
        let kind = request.kind;
        let port = resource_port(
            &request.name,
            self.settings.resource_base_port,
            self.settings.resource_port_range,
        );

        ServiceSpec {
            image: Some(kind.image().to_string()),
            ports: vec![PortMapping::tcp(kind.container_port(), port)],
            environment: kind.credentials(&request.name).into_iter().collect(),
            volumes: vec![format!("{volume}:{}", kind.data_path())],
            networks: vec![self.settings.network.clone()],
            depends_on: Vec::new(),
            healthcheck: None,
            deploy: Some(Deploy {
                replicas: 1,
                restart_policy: Some(RestartPolicy::default()),
            }),
            labels: BTreeMap::from([
                (labels::RESOURCE_NAME.to_string(), request.name.clone()),
                (labels::RESOURCE_KIND.to_string(), kind.to_string()),
                (labels::RESOURCE_PROJECT.to_string(), request.project_id.clone()),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{GameMetadata, ResourceKind};
    use crate::test_utils::generators::resource_name;
    use proptest::prelude::*;

    fn result(id: &str, port: u16) -> BuildResult {
        BuildResult {
            project_id: id.to_string(),
            service_name: sanitize_name(id),
            container_name: format!("{id}-1"),
            game_name: id.to_string(),
            display_name: None,
            namespace_id: None,
            metadata: GameMetadata::default(),
            image_reference: format!("local-minecraft-{id}:latest"),
            image_tags: vec![format!("local-minecraft-{id}:latest")],
            assigned_port: port,
            secret_vars: BTreeMap::new(),
            resources: Vec::new(),
        }
    }

    fn request(project: &str, name: &str, kind: ResourceKind) -> ResourceRequest {
        ResourceRequest {
            project_id: project.to_string(),
            name: name.to_string(),
            kind,
        }
    }

    #[test]
    fn test_project_service_shape() {
        let mut built = result("alpha", 25566);
        built.namespace_id = Some("ns".to_string());
        built.secret_vars.insert("API_KEY".to_string(), "k".to_string());

        let outcome = TopologyMerger::default().merge(None, &[built], &[]);
        let service = &outcome.state.managed["alpha"];

        assert_eq!(service.image.as_deref(), Some("local-minecraft-alpha:latest"));
        assert_eq!(
            service.ports,
            vec![PortMapping::tcp(25565, 25566), PortMapping::tcp(5005, 5006)]
        );
        assert_eq!(service.environment["POD_NAME"], "alpha-1");
        assert_eq!(service.environment["MINEPLEX_NAMESPACE_ID"], "ns");
        assert_eq!(service.environment["API_KEY"], "k");
        assert_eq!(service.environment["EULA"], "TRUE");
        assert_eq!(service.networks, vec![defaults::DEFAULT_NETWORK]);
        assert_eq!(service.label(labels::PORT), Some("25566"));
        assert_eq!(service.label(labels::NAMESPACE_ID), Some("ns"));
        assert!(service.healthcheck.is_some());
    }

    #[test]
    fn test_stale_managed_entries_replaced() {
        let mut prior = TopologyState::new();
        prior.managed.insert("old".to_string(), ServiceSpec::default());

        let outcome = TopologyMerger::default().merge(Some(prior), &[result("alpha", 25565)], &[]);
        let names: Vec<_> = outcome.state.managed.keys().cloned().collect();
        assert_eq!(names, vec!["alpha"]);
    }

    #[test]
    fn test_resource_dedup_first_wins() {
        let requests = vec![
            request("alpha", "stats", ResourceKind::Mongodb),
            request("beta", "stats", ResourceKind::Postgres),
            request("alpha", "stats", ResourceKind::Mongodb),
        ];

        let outcome = TopologyMerger::default().merge(None, &[], &requests);
        let resources: Vec<_> = outcome
            .state
            .managed
            .iter()
            .filter(|(_, s)| s.label(labels::RESOURCE_NAME).is_some())
            .collect();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].0, "db-stats");
        assert_eq!(resources[0].1.image.as_deref(), Some("mongo:7"));
        assert_eq!(
            outcome.conflicts,
            vec![MergeConflict {
                service: "db-stats".to_string(),
                name: "stats".to_string(),
                kept_project: "alpha".to_string(),
                skipped_project: "beta".to_string(),
            }]
        );
        assert!(outcome.state.volumes.contains_key("db-stats-data"));
    }

    #[test]
    fn test_project_depends_on_resource() {
        let mut built = result("alpha", 25565);
        built.resources = vec![request("alpha", "Stats", ResourceKind::Redis)];
        let requests = resource_requests(std::slice::from_ref(&built));

        let outcome = TopologyMerger::default().merge(None, &[built], &requests);
        assert_eq!(outcome.state.managed["alpha"].depends_on, vec!["db-stats"]);
    }

    #[test]
    fn test_volumes_never_pruned() {
        let mut prior = TopologyState::new();
        prior
            .volumes
            .insert(Value::from("db-gone-data"), Value::Mapping(Mapping::new()));

        let outcome = TopologyMerger::default().merge(Some(prior), &[], &[]);
        assert!(outcome.state.volumes.contains_key("db-gone-data"));
    }

    #[test]
    fn test_network_added_once() {
        let outcome = TopologyMerger::default().merge(None, &[], &[]);
        assert_eq!(outcome.state.networks.len(), 1);
        let again = TopologyMerger::default().merge(Some(outcome.state), &[], &[]);
        assert_eq!(again.state.networks.len(), 1);
    }

    #[test]
    fn test_existing_network_definition_kept() {
        let mut prior = TopologyState::new();
        let mut custom = Mapping::new();
        custom.insert(Value::from("driver"), Value::from("bridge"));
        prior
            .networks
            .insert(Value::from(defaults::DEFAULT_NETWORK), Value::Mapping(custom.clone()));

        let outcome = TopologyMerger::default().merge(Some(prior), &[], &[]);
        assert_eq!(
            outcome.state.networks.get(defaults::DEFAULT_NETWORK),
            Some(&Value::Mapping(custom))
        );
    }

    #[test]
    fn test_service_key_claimed_once() {
        let mut second = result("alpha", 25566);
        second.project_id = "Alpha".to_string();

        let outcome = TopologyMerger::default().merge(None, &[result("alpha", 25565), second], &[]);
        assert_eq!(outcome.state.managed.len(), 1);
        assert_eq!(outcome.state.managed["alpha"].label(labels::PROJECT_ID), Some("alpha"));
        assert_eq!(
            outcome.clashes,
            vec![ServiceClash {
                service: "alpha".to_string(),
                project_id: "Alpha".to_string(),
                reason: "already taken by alpha".to_string(),
            }]
        );
    }

    #[test]
    fn test_preserved_and_empty_keys_are_clashes() {
        let prior = TopologyState::from_yaml(
            "services:\n  kafka:\n    image: bitnami/kafka\n",
            std::path::Path::new("docker-compose.yml"),
        )
        .unwrap();
        let mut empty = result("x", 25566);
        empty.project_id = "§§".to_string();
        empty.service_name = String::new();

        let outcome =
            TopologyMerger::default().merge(Some(prior), &[result("kafka", 25565), empty], &[]);
        assert!(outcome.state.managed.is_empty());
        let clashed: Vec<&str> = outcome.clashes.iter().map(|c| c.project_id.as_str()).collect();
        assert_eq!(clashed, vec!["kafka", "§§"]);
    }

    #[test]
    fn test_resource_cannot_take_project_service() {
        let mut owner = result("db-stats", 25565);
        owner.project_id = "db-stats".to_string();
        let mut declaring = result("beta", 25566);
        declaring.resources = vec![request("beta", "stats", ResourceKind::Redis)];
        let results = vec![owner, declaring];
        let requests = resource_requests(&results);

        let outcome = TopologyMerger::default().merge(None, &results, &requests);
        let service = &outcome.state.managed["db-stats"];
        assert_eq!(service.label(labels::PROJECT_ID), Some("db-stats"));
        assert!(outcome.state.managed["beta"].depends_on.is_empty());
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].kept_project, "db-stats");
        assert_eq!(outcome.conflicts[0].skipped_project, "beta");
        assert!(outcome.clashes.is_empty());
    }

    #[test]
    fn test_resources_of_left_out_projects_are_dropped() {
        let first = result("alpha", 25565);
        let mut second = result("alpha", 25566);
        second.project_id = "ALPHA".to_string();
        second.resources = vec![request("ALPHA", "cache", ResourceKind::Redis)];
        let results = vec![first, second];
        let requests = resource_requests(&results);

        let outcome = TopologyMerger::default().merge(None, &results, &requests);
        assert!(!outcome.state.managed.contains_key("db-cache"));
        assert_eq!(outcome.clashes.len(), 1);
    }

    #[test]
    fn test_resource_port_window() {
        let port = resource_port("stats", 27100, 900);
        assert!((27100..28000).contains(&port));
        assert_eq!(resource_port("stats", 27100, 0), 27100);
    }

    proptest! {
        #[test]
        fn prop_resource_port_is_pure(name in resource_name()) {
            let first = resource_port(&name, 27100, 900);
            let second = resource_port(&name, 27100, 900);
            prop_assert_eq!(first, second);
            prop_assert!((27100..28000).contains(&first));
        }
    }
}
