//! Integration tests for the Build Coordinator
//!
//! - Outcomes come back in submission order whatever the finish order
//! - One failing project never affects the others
//! - Ports follow submission order
//! - Projects past the end of the port range fail without building
//! - The external build is bounded by the compile timeout

mod common;

use common::{fake_task, test_config, FakeCompiler, FakeImageBuilder, TestProject};
use gamestack::core::builder::BuildCoordinator;
use gamestack::core::descriptor::ProjectDescriptor;
use gamestack::core::task::BuildStep;
use gamestack::error::TaskError;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn descriptors(project: &TestProject, names: &[&str]) -> Vec<ProjectDescriptor> {
    names
        .iter()
        .map(|name| ProjectDescriptor::load(&project.add_game(name, name)).unwrap())
        .collect()
}

#[tokio::test]
async fn test_failure_is_isolated() {
    let project = TestProject::new();
    let bridge = project.bridge_jar();
    let descriptors = descriptors(&project, &["alpha", "beta", "gamma"]);

    let compiler = Arc::new(FakeCompiler::new().failing_for("beta"));
    let images = Arc::new(FakeImageBuilder::new());
    let task = fake_task(test_config(&bridge), compiler.clone(), images.clone());

    let report = BuildCoordinator::new(task).build_all(descriptors).await;

    assert_eq!(report.len(), 3);
    let outcomes = report.outcomes();
    assert!(outcomes[0].is_ok());
    assert!(outcomes[2].is_ok());
    let failure = outcomes[1].as_ref().unwrap_err();
    assert_eq!(failure.project_id, "beta");
    assert_eq!(failure.step, BuildStep::Compile);
    assert!(matches!(failure.error, TaskError::ExternalBuildFailed { .. }));

    assert_eq!(compiler.calls.lock().unwrap().len(), 3);
    assert_eq!(images.recorded().len(), 2);

    let (successes, failures) = report.into_parts();
    let ports: Vec<u16> = successes.iter().map(|r| r.assigned_port).collect();
    assert_eq!(ports, vec![25565, 25567]);
    assert_eq!(failures.len(), 1);
}

#[tokio::test]
async fn test_slowest_first_keeps_submission_order() {
    let project = TestProject::new();
    let bridge = project.bridge_jar();
    let descriptors = descriptors(&project, &["one", "two", "three"]);

    let compiler = Arc::new(
        FakeCompiler::new()
            .with_delay("one", Duration::from_millis(150))
            .with_delay("two", Duration::from_millis(75)),
    );
    let task = fake_task(
        test_config(&bridge),
        compiler,
        Arc::new(FakeImageBuilder::new()),
    );

    let report = BuildCoordinator::new(task).build_all(descriptors).await;
    let ids: Vec<&str> = report
        .successes()
        .map(|r| r.project_id.as_str())
        .collect();
    assert_eq!(ids, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_compile_timeout() {
    let project = TestProject::new();
    let bridge = project.bridge_jar();
    let descriptors = descriptors(&project, &["stuck", "quick"]);

    let compiler = Arc::new(FakeCompiler::new().with_delay("stuck", Duration::from_secs(30)));
    let config = test_config(&bridge).with_compile_timeout(Duration::from_millis(100));
    let task = fake_task(config, compiler, Arc::new(FakeImageBuilder::new()));

    let report = BuildCoordinator::new(task).build_all(descriptors).await;

    let failure = report.outcomes()[0].as_ref().unwrap_err();
    assert_eq!(failure.step, BuildStep::Compile);
    assert!(matches!(failure.error, TaskError::ExternalBuildTimeout { .. }));
    assert!(report.outcomes()[1].is_ok());
}

#[tokio::test]
async fn test_assigned_ports_are_kept() {
    let project = TestProject::new();
    let bridge = project.bridge_jar();
    let mut descriptors = descriptors(&project, &["left", "right"]);
    let right = descriptors.pop().unwrap();
    let left = descriptors.pop().unwrap();

    let task = fake_task(
        test_config(&bridge),
        Arc::new(FakeCompiler::new()),
        Arc::new(FakeImageBuilder::new()),
    );
    let report = BuildCoordinator::new(task)
        .build_assigned(vec![(left, 25570), (right, 25566)])
        .await;

    let ports: Vec<u16> = report.successes().map(|r| r.assigned_port).collect();
    assert_eq!(ports, vec![25570, 25566]);
}

#[tokio::test]
async fn test_projects_past_port_range_fail() {
    let project = TestProject::new();
    let bridge = project.bridge_jar();
    let descriptors = descriptors(&project, &["first", "second", "third"]);

    let compiler = Arc::new(FakeCompiler::new());
    let task = fake_task(
        test_config(&bridge).with_ports(65534, 5005),
        compiler.clone(),
        Arc::new(FakeImageBuilder::new()),
    );
    let report = BuildCoordinator::new(task).build_all(descriptors).await;

    assert_eq!(report.len(), 3);
    let ports: Vec<u16> = report.successes().map(|r| r.assigned_port).collect();
    assert_eq!(ports, vec![65534, 65535]);
    let failure = report.outcomes()[2].as_ref().unwrap_err();
    assert_eq!(failure.project_id, "third");
    assert_eq!(failure.step, BuildStep::PortAssignment);
    assert!(matches!(
        failure.error,
        TaskError::NoPortLeft {
            base_port: 65534,
            index: 2
        }
    ));
    assert_eq!(compiler.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_batch() {
    let project = TestProject::new();
    let bridge = project.bridge_jar();
    let task = fake_task(
        test_config(&bridge),
        Arc::new(FakeCompiler::new()),
        Arc::new(FakeImageBuilder::new()),
    );
    let report = BuildCoordinator::new(task).build_all(Vec::new()).await;
    assert!(report.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_outcome_order_matches_submission(delays in prop::collection::vec(0u64..40, 1..6)) {
        let project = TestProject::new();
        let bridge = project.bridge_jar();
        let names: Vec<String> = (0..delays.len()).map(|i| format!("game{i}")).collect();

        let mut compiler = FakeCompiler::new();
        for (name, delay) in names.iter().zip(&delays) {
            compiler = compiler.with_delay(name, Duration::from_millis(*delay));
        }
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let descriptors = descriptors(&project, &name_refs);
        let task = fake_task(
            test_config(&bridge),
            Arc::new(compiler),
            Arc::new(FakeImageBuilder::new()),
        );

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let report = runtime.block_on(BuildCoordinator::new(task).build_all(descriptors));

        let ids: Vec<String> = report.successes().map(|r| r.project_id.clone()).collect();
        prop_assert_eq!(ids, names);
        let ports: Vec<u16> = report.successes().map(|r| r.assigned_port).collect();
        let expected: Vec<u16> = (0..delays.len()).map(|i| 25565 + i as u16).collect();
        prop_assert_eq!(ports, expected);
    }
}
