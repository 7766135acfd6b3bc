//! Build Coordinator
//!
//! Runs one Build Task per project concurrently and hands back outcomes in
//! submission order, whatever order the tasks finish in.

use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::core::descriptor::ProjectDescriptor;
use crate::core::task::{BuildFailure, BuildResult, BuildStep, BuildTask};
use crate::error::TaskError;

/// Outcome of one project in a batch
pub type BuildOutcome = Result<BuildResult, BuildFailure>;

/// Outcomes of a batch, in submission order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    outcomes: Vec<BuildOutcome>,
}

impl BatchReport {
    /// Every outcome, in submission order
    pub fn outcomes(&self) -> &[BuildOutcome] {
        &self.outcomes
    }

    /// Number of projects in the batch
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Successful builds, in submission order
    pub fn successes(&self) -> impl Iterator<Item = &BuildResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    /// Failed builds, in submission order
    pub fn failures(&self) -> impl Iterator<Item = &BuildFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    /// Split into successes and failures, each in submission order
    pub fn into_parts(self) -> (Vec<BuildResult>, Vec<BuildFailure>) {
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                Ok(result) => successes.push(result),
                Err(failure) => failures.push(failure),
            }
        }
        (successes, failures)
    }
}

/// Serializable one-line summary of an outcome
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    /// Project identifier
    pub project_id: String,
    /// Whether the build succeeded
    pub success: bool,
    /// Canonical image reference on success
    pub image: Option<String>,
    /// Published port on success
    pub port: Option<u16>,
    /// Failure description
    pub error: Option<String>,
}

impl From<&BuildOutcome> for OutcomeSummary {
    fn from(outcome: &BuildOutcome) -> Self {
        match outcome {
            Ok(result) => Self {
                project_id: result.project_id.clone(),
                success: true,
                image: Some(result.image_reference.clone()),
                port: Some(result.assigned_port),
                error: None,
            },
            Err(failure) => Self {
                project_id: failure.project_id.clone(),
                success: false,
                image: None,
                port: None,
                error: Some(format!("{} failed: {}", failure.step, failure.error)),
            },
        }
    }
}

/// Fans a batch of projects out to concurrent Build Tasks
#[derive(Debug, Clone)]
pub struct BuildCoordinator {
    task: Arc<BuildTask>,
}

impl BuildCoordinator {
    /// Create a coordinator around a Build Task
    pub fn new(task: BuildTask) -> Self {
        Self {
            task: Arc::new(task),
        }
    }

    /// Build every project, reserving `base_port + index` for each.
    ///
    /// Projects past the end of the port range fail without being built.
    pub async fn build_all(&self, descriptors: Vec<ProjectDescriptor>) -> BatchReport {
        let config = self.task.config();
        let mut jobs = Vec::with_capacity(descriptors.len());
        let mut unplaced = Vec::new();
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            match config.port_for_index(index) {
                Some(port) => jobs.push((descriptor, port)),
                None => unplaced.push(Err(BuildFailure {
                    project_id: descriptor.project_id,
                    step: BuildStep::PortAssignment,
                    error: TaskError::NoPortLeft {
                        base_port: config.base_port,
                        index,
                    },
                })),
            }
        }

        let mut report = self.build_assigned(jobs).await;
        report.outcomes.extend(unplaced);
        report
    }

    /// Build projects on explicitly assigned ports
    pub async fn build_assigned(&self, jobs: Vec<(ProjectDescriptor, u16)>) -> BatchReport {
        tracing::info!("Building {} project(s) in parallel", jobs.len());

        let project_ids: Vec<String> = jobs.iter().map(|(d, _)| d.project_id.clone()).collect();
        let mut slots: Vec<Option<BuildOutcome>> = (0..jobs.len()).map(|_| None).collect();
        let mut join_set = JoinSet::new();

        for (index, (descriptor, port)) in jobs.into_iter().enumerate() {
            let task = Arc::clone(&self.task);
            join_set.spawn(async move {
                let outcome = AssertUnwindSafe(task.build(&descriptor, port))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(aborted(&descriptor.project_id, panic_message(panic.as_ref())))
                    });
                (index, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    match &outcome {
                        Ok(result) => tracing::info!("{} built", result.project_id),
                        Err(failure) => tracing::error!("{failure}"),
                    }
                    slots[index] = Some(outcome);
                }
                Err(e) => tracing::error!("Build task did not complete: {e}"),
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(project_ids)
            .map(|(slot, project_id)| {
                slot.unwrap_or_else(|| Err(aborted(&project_id, "task was cancelled".to_string())))
            })
            .collect();
        BatchReport { outcomes }
    }
}

fn aborted(project_id: &str, message: String) -> BuildFailure {
    BuildFailure {
        project_id: project_id.to_string(),
        step: BuildStep::Aborted,
        error: TaskError::Aborted { message },
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(id: &str) -> BuildFailure {
        aborted(id, "x".to_string())
    }

    #[test]
    fn test_empty_report() {
        let report = BatchReport::default();
        assert!(report.is_empty());
        assert_eq!(report.successes().count(), 0);
    }

    #[test]
    fn test_into_parts_keeps_order() {
        let report = BatchReport {
            outcomes: vec![Err(failure("a")), Err(failure("b"))],
        };
        let (successes, failures) = report.into_parts();
        assert!(successes.is_empty());
        let ids: Vec<_> = failures.iter().map(|f| f.project_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_outcome_summary_for_failure() {
        let summary = OutcomeSummary::from(&Err(failure("a")));
        assert!(!summary.success);
        assert_eq!(summary.error.as_deref(), Some("aborted failed: Build task aborted: x"));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
    }
}
