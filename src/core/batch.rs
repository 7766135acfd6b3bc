//! Batch runs
//!
//! Builds a batch of projects, merges the successes into the workspace
//! topology and records where each project lives. Also plans rebuilds from
//! a persisted topology.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::builder::{BatchReport, BuildCoordinator, BuildOutcome, OutcomeSummary};
use crate::core::descriptor::ProjectDescriptor;
use crate::core::merge::{resource_requests, MergeConflict, ServiceClash, TopologyMerger};
use crate::core::project_paths::ProjectPathRegistry;
use crate::core::task::{BuildFailure, BuildResult, BuildStep, BuildTask};
use crate::core::topology::TopologyState;
use crate::core::workspace::Workspace;
use crate::error::{GamestackError, TaskError};

/// What a batch run did
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Successful builds, in submission order
    pub successes: Vec<BuildResult>,
    /// Failed builds, in submission order
    pub failures: Vec<BuildFailure>,
    /// Resource declarations that lost to an earlier one
    pub conflicts: Vec<MergeConflict>,
    /// Whether topology and registry were written
    pub persisted: bool,
    /// Project ids in submission order
    submitted: Vec<String>,
}

impl BatchSummary {
    /// At least one build succeeded and the results were recorded
    pub fn succeeded(&self) -> bool {
        !self.successes.is_empty() && self.persisted
    }

    /// One line per project, in submission order
    pub fn outcome_summaries(&self) -> Vec<OutcomeSummary> {
        let mut outcomes: Vec<BuildOutcome> = self
            .successes
            .iter()
            .cloned()
            .map(Ok)
            .chain(self.failures.iter().cloned().map(Err))
            .collect();
        outcomes.sort_by_key(|outcome| self.position(outcome_project(outcome)));
        outcomes.iter().map(OutcomeSummary::from).collect()
    }

    fn position(&self, project_id: &str) -> usize {
        self.submitted
            .iter()
            .position(|id| id == project_id)
            .unwrap_or(self.submitted.len())
    }

    /// Move results the merge left out over to the failures
    fn reject(&mut self, clashes: Vec<ServiceClash>) {
        for clash in clashes {
            let Some(index) = self
                .successes
                .iter()
                .position(|r| r.project_id == clash.project_id)
            else {
                continue;
            };
            self.successes.remove(index);
            self.failures.push(BuildFailure {
                project_id: clash.project_id,
                step: BuildStep::ServiceName,
                error: TaskError::ServiceNameUnavailable {
                    service: clash.service,
                    reason: clash.reason,
                },
            });
        }
        self.order_failures();
    }

    fn order_failures(&mut self) {
        let mut failures = std::mem::take(&mut self.failures);
        failures.sort_by_key(|f| self.position(&f.project_id));
        self.failures = failures;
    }
}

fn outcome_project(outcome: &BuildOutcome) -> &str {
    match outcome {
        Ok(result) => &result.project_id,
        Err(failure) => &failure.project_id,
    }
}

/// Keep the first descriptor per service key; later ones become failures.
///
/// Two projects with the same key would build the same image tag and
/// claim the same topology entry.
pub fn claim_service_keys(
    descriptors: Vec<ProjectDescriptor>,
) -> (Vec<ProjectDescriptor>, Vec<BuildFailure>) {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut kept = Vec::new();
    let mut rejected = Vec::new();
    for descriptor in descriptors {
        let key = descriptor.service_key();
        if let Some(owner) = owners.get(&key) {
            tracing::warn!(
                "{} maps to service '{key}' already used by {owner}; skipping",
                descriptor.project_id
            );
            rejected.push(BuildFailure {
                project_id: descriptor.project_id,
                step: BuildStep::ServiceName,
                error: TaskError::ServiceNameUnavailable {
                    service: key,
                    reason: format!("already taken by {owner}"),
                },
            });
            continue;
        }
        owners.insert(key, descriptor.project_id.clone());
        kept.push(descriptor);
    }
    (kept, rejected)
}

/// Build every descriptor, then merge and persist the successes.
///
/// Projects whose service key is already claimed, earlier in the batch or
/// by a preserved entry, are reported as failures. Nothing is written when
/// no project is left. A batch too large for the configured port range is
/// refused before anything is built. A failure to read the prior topology or to write
/// either file is returned as an error; the builds that already ran are
/// lost with it.
pub async fn run_batch(
    workspace: &Workspace,
    task: BuildTask,
    descriptors: Vec<ProjectDescriptor>,
) -> Result<BatchSummary, GamestackError> {
    let submitted: Vec<String> = descriptors.iter().map(|d| d.project_id.clone()).collect();
    let mut sources: HashMap<String, PathBuf> = HashMap::new();
    for descriptor in &descriptors {
        sources
            .entry(descriptor.project_id.clone())
            .or_insert_with(|| descriptor.source_dir.clone());
    }
    let (descriptors, duplicates) = claim_service_keys(descriptors);
    task.config().check_port_window(descriptors.len())?;

    let report = BuildCoordinator::new(task).build_all(descriptors).await;
    let mut summary = summarize(report, submitted);
    summary.failures.extend(duplicates);
    summary.order_failures();
    if summary.successes.is_empty() {
        tracing::error!("No project built successfully; topology left untouched");
        return Ok(summary);
    }

    let topology_path = workspace.topology_path();
    let prior = TopologyState::load(&topology_path)?;
    let merger = TopologyMerger::new(workspace.merge_settings());
    let outcome = merger.merge(
        prior,
        &summary.successes,
        &resource_requests(&summary.successes),
    );
    summary.reject(outcome.clashes);
    if summary.successes.is_empty() {
        tracing::error!("No built project could be placed in the topology; topology left untouched");
        return Ok(summary);
    }
    outcome.state.save(&topology_path)?;
    tracing::info!(
        "Wrote {} managed service(s) to {}",
        outcome.state.managed.len(),
        topology_path.display()
    );
    summary.conflicts = outcome.conflicts;

    let registry_path = workspace.project_paths_path();
    let mut registry = ProjectPathRegistry::load(&registry_path).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable project registry: {e}");
        ProjectPathRegistry::new()
    });
    for result in &summary.successes {
        if let Some(path) = sources.get(&result.project_id) {
            registry.upsert(&result.project_id, path, &result.game_name);
        }
    }
    registry.save(&registry_path)?;

    summary.persisted = true;
    Ok(summary)
}

fn summarize(report: BatchReport, submitted: Vec<String>) -> BatchSummary {
    let (successes, failures) = report.into_parts();
    for failure in &failures {
        tracing::warn!("{failure}");
    }
    BatchSummary {
        successes,
        failures,
        submitted,
        ..BatchSummary::default()
    }
}

/// A managed service that cannot be rebuilt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildSkip {
    /// Service key
    pub service: String,
    /// Why it was skipped
    pub reason: String,
}

/// Projects to rebuild and the services left out
#[derive(Debug, Clone, Default)]
pub struct RebuildPlan {
    /// Descriptors with the port their service already publishes
    pub jobs: Vec<(ProjectDescriptor, u16)>,
    /// Services that could not be mapped back to a project
    pub skipped: Vec<RebuildSkip>,
}

/// Map the managed services of `state` back to their projects.
///
/// `only` restricts the plan to the listed project ids when non-empty.
pub fn plan_rebuild(
    state: &TopologyState,
    registry: &ProjectPathRegistry,
    only: &[String],
) -> RebuildPlan {
    let mut plan = RebuildPlan::default();
    for managed in state.managed_projects() {
        if !only.is_empty() && !only.contains(&managed.project_id) {
            continue;
        }
        let Some(location) = registry.get(&managed.project_id) else {
            plan.skipped.push(RebuildSkip {
                service: managed.service,
                reason: format!("no recorded path for project '{}'", managed.project_id),
            });
            continue;
        };
        match ProjectDescriptor::load(&location.path) {
            Ok(descriptor) => plan.jobs.push((descriptor, managed.port)),
            Err(e) => plan.skipped.push(RebuildSkip {
                service: managed.service,
                reason: e.to_string(),
            }),
        }
    }
    plan
}

/// Rebuild planned projects on their recorded ports; the topology is not touched
pub async fn run_rebuild(task: BuildTask, plan: RebuildPlan) -> BatchSummary {
    let submitted = plan.jobs.iter().map(|(d, _)| d.project_id.clone()).collect();
    let report = BuildCoordinator::new(task).build_assigned(plan.jobs).await;
    let mut summary = summarize(report, submitted);
    summary.persisted = true;
    summary
}
