//! The worker side of a job, run against a mock toolchain.

mod common;

use babysitter::application::{Worker, WorkerOutcome};
use babysitter::domain::models::{FailureKind, JobStatus};
use common::Workspace;

const DESCRIPTOR: &str = "solver:\n  precision: 1024\ndata:\n  - filename: gap.json\n";

const SOLVER_OUTPUT: &str = "\
terminateReason = \"found primal feasible solution\";
primalObjective = 1.25;
dualObjective = 1.2500000000000000000000000000001;
dualityGap = 1e-31;
runtime = 42.0;
";

fn worker(ws: &Workspace, backend: std::sync::Arc<babysitter::adapters::backends::MockBackend>) -> Worker {
    Worker::new(backend, ws.journals.clone(), ws.descriptors.clone())
}

#[tokio::test]
async fn test_worker_records_solver_results() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", DESCRIPTOR);
    let backend = ws.backend();
    backend.set_solver_output(SOLVER_OUTPUT).await;

    let outcome = worker(&ws, backend.clone()).run(&path).await.unwrap();

    assert_eq!(
        outcome,
        WorkerOutcome::Finished(Some("found primal feasible solution".to_string()))
    );
    assert!(ws.path("gap.json").exists(), "missing data file is created");
    assert_eq!(backend.solver_calls().await, vec![path.clone()]);

    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Finished);
    assert_eq!(
        journal.last_value("dualObjective", Some("wrk")),
        Some("1.2500000000000000000000000000001")
    );
    assert_eq!(journal.last_value("runtime", None), Some("42.0"));
    assert_eq!(
        journal.last_value("result", None),
        Some("data file(s) created")
    );
    let text = ws.journal_text(&path);
    assert!(text.starts_with("wrk :: status :: running\n"));
    assert!(text.ends_with("wrk :: status :: finished\n"));
}

#[tokio::test]
async fn test_worker_skips_existing_data_files() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", DESCRIPTOR);
    std::fs::write(ws.path("gap.json"), "{\"prepared\": true}").unwrap();
    let backend = ws.backend();
    backend.set_solver_output(SOLVER_OUTPUT).await;

    worker(&ws, backend).run(&path).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(ws.path("gap.json")).unwrap(),
        "{\"prepared\": true}"
    );
    assert_eq!(
        ws.journal(&path).last_value("result", None),
        Some("data file(s) already exist")
    );
}

#[tokio::test]
async fn test_solver_failure_fails_job() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", DESCRIPTOR);
    let backend = ws.backend();
    backend.fail_solver(134).await;

    let outcome = worker(&ws, backend).run(&path).await.unwrap();

    assert_eq!(outcome, WorkerOutcome::Failed(FailureKind::ProcessFailure));
    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Failed);
    assert_eq!(journal.failure_kind(), Some(FailureKind::ProcessFailure));
    assert!(journal.last_value("error", None).unwrap().contains("134"));
}

#[tokio::test]
async fn test_missing_output_fails_job() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", DESCRIPTOR);

    let outcome = worker(&ws, ws.backend()).run(&path).await.unwrap();

    assert_eq!(outcome, WorkerOutcome::Failed(FailureKind::MissingOutput));
    assert_eq!(
        ws.journal(&path).failure_kind(),
        Some(FailureKind::MissingOutput)
    );
}

#[tokio::test]
async fn test_worker_output_feeds_the_driver() {
    use babysitter::services::{DriveOutcome, DriverOptions};
    use tokio_util::sync::CancellationToken;

    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", DESCRIPTOR);
    let backend = ws.backend();
    backend
        .set_solver_output("terminateReason = \"maxIterations exceeded\";\n")
        .await;

    let driver = ws.driver(backend.clone(), DriverOptions::default());
    driver.drive(&path, &CancellationToken::new()).await.unwrap();
    worker(&ws, backend.clone()).run(&path).await.unwrap();
    let report = driver.drive(&path, &CancellationToken::new()).await.unwrap();

    // a budget timeout goes straight back to the backend
    assert_eq!(report.outcome, DriveOutcome::AwaitingCompletion);
    assert_eq!(backend.submissions().await.len(), 2);
    assert_eq!(ws.journal(&path).submission_count(), 2);
}
