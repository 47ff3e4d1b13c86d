//! End-to-end lifecycle scenarios over file-backed journals and descriptors.

mod common;

use std::path::Path;

use babysitter::adapters::backends::MockRun;
use babysitter::domain::models::{FailureKind, JobDescriptor, JobStatus, Outcome};
use babysitter::domain::ports::DescriptorStore;
use babysitter::services::{decide, AnalyzerPolicy, DriveOutcome, DriverOptions};
use common::{bisection_yaml, timed_out_submissions, Workspace, PLAIN_YAML};
use tokio_util::sync::CancellationToken;

async fn load(ws: &Workspace, path: &Path) -> JobDescriptor {
    ws.descriptors.load(path).await.unwrap()
}

#[tokio::test]
async fn test_fresh_descriptor_is_submitted_once() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    let backend = ws.backend();

    let report = ws
        .driver(backend.clone(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, DriveOutcome::AwaitingCompletion);
    assert_eq!(report.submissions, 1);
    assert_eq!(backend.submissions().await, vec![path.clone()]);

    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Submitted);
    assert_eq!(journal.submission_id(), Some("mock-1"));
    assert!(journal.last_value("submissionTime", Some("sub")).is_some());
}

#[tokio::test]
async fn test_second_invocation_does_not_resubmit() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    let backend = ws.backend();
    let driver = ws.driver(backend.clone(), DriverOptions::default());

    driver.drive(&path, &CancellationToken::new()).await.unwrap();
    let report = driver.drive(&path, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, DriveOutcome::AwaitingCompletion);
    assert_eq!(report.submissions, 0);
    assert_eq!(backend.submissions().await.len(), 1);
    assert_eq!(ws.journal(&path).submission_count(), 1);
}

#[tokio::test]
async fn test_budget_timeout_below_ceiling_resubmits() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    ws.seed_journal(&path, &timed_out_submissions(3));
    let backend = ws.backend();

    let report = ws
        .driver(
            backend.clone(),
            DriverOptions {
                max_submissions: Some(10),
                ..DriverOptions::default()
            },
        )
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, DriveOutcome::AwaitingCompletion);
    assert_eq!(report.submissions, 1);
    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Submitted);
    assert_eq!(journal.submission_count(), 4);
}

#[tokio::test]
async fn test_budget_timeout_at_ceiling_fails() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    ws.seed_journal(&path, &timed_out_submissions(10));
    let backend = ws.backend();

    let report = ws
        .driver(
            backend.clone(),
            DriverOptions {
                max_submissions: Some(10),
                ..DriverOptions::default()
            },
        )
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        DriveOutcome::Failed(Some(FailureKind::SubmissionCeilingExceeded))
    );
    assert!(backend.submissions().await.is_empty());
    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Failed);
    assert_eq!(
        journal.failure_kind(),
        Some(FailureKind::SubmissionCeilingExceeded)
    );
    assert_eq!(journal.submission_count(), 10);
}

#[tokio::test]
async fn test_bisection_step_writes_successor() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", &bisection_yaml("0.5", "0.4", "0.6", "0.05"));
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: found primal feasible solution\n\
         wrk :: status :: finished\n",
    );
    let backend = ws.backend();

    let report = ws
        .driver(backend.clone(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    let successor = ws.path("run.count001.yaml");
    assert_eq!(report.successors, vec![successor.clone()]);
    assert_eq!(report.descriptor, successor);
    assert_eq!(report.outcome, DriveOutcome::AwaitingCompletion);

    // the original is superseded
    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Concluded);
    assert_eq!(
        journal.replaced_with(),
        Some(successor.display().to_string().as_str())
    );

    // the successor carries the narrowed interval and the next midpoint
    let next = load(&ws, &successor).await;
    let search = next.search.binary_search.as_ref().unwrap();
    assert_eq!(search.primal, "0.5");
    assert_eq!(search.dual, "0.6");
    assert_eq!(search.threshold, "0.05");
    assert_eq!(next.data[0].variables["gap"], "0.55");
    assert_eq!(next.data[0].filename, "gap.count001.json");

    // and it was submitted; the original descriptor file is untouched
    assert_eq!(backend.submissions().await, vec![successor.clone()]);
    assert_eq!(ws.journal(&successor).status().unwrap(), JobStatus::Submitted);
    let original = load(&ws, &path).await;
    assert_eq!(original.data[0].variables["gap"], "0.5");
}

#[tokio::test]
async fn test_converged_bisection_concludes() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", &bisection_yaml("0.5", "0.49", "0.51", "0.05"));
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: found primal feasible solution\n\
         wrk :: status :: finished\n",
    );
    let backend = ws.backend();

    let report = ws
        .driver(backend.clone(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, DriveOutcome::Concluded);
    assert!(report.successors.is_empty());
    assert!(backend.submissions().await.is_empty());
    assert!(!ws.path("run.count001.yaml").exists());
    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Concluded);
    assert_eq!(journal.replaced_with(), None);
}

#[tokio::test]
async fn test_failed_job_is_left_alone_without_force() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    let text = "sub :: status :: submitted\nwrk :: status :: failed\nwrk :: errorKind :: MissingOutput\n";
    ws.seed_journal(&path, text);
    let backend = ws.backend();

    let report = ws
        .driver(backend.clone(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        DriveOutcome::Failed(Some(FailureKind::MissingOutput))
    );
    assert_eq!(ws.journal_text(&path), text);
    assert!(backend.submissions().await.is_empty());
}

#[tokio::test]
async fn test_wait_runs_chain_to_conclusion() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", &bisection_yaml("0.5", "0", "1", "0.3"));
    let backend = ws.backend();
    // 0.5 is dual: [0, 0.5] -> 0.25 is primal: [0.25, 0.5] is narrower than 0.3
    backend
        .script_any(MockRun::finished("found dual feasible solution"))
        .await;
    backend
        .script_any(MockRun::finished("found primal feasible solution"))
        .await;

    let report = ws
        .driver(
            backend.clone(),
            DriverOptions {
                wait: true,
                ..DriverOptions::default()
            },
        )
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    let successor = ws.path("run.count001.yaml");
    assert_eq!(report.outcome, DriveOutcome::Concluded);
    assert_eq!(report.submissions, 2);
    assert_eq!(report.successors, vec![successor.clone()]);
    assert_eq!(report.descriptor, successor);

    let next = load(&ws, &successor).await;
    let search = next.search.binary_search.as_ref().unwrap();
    assert_eq!(search.primal, "0");
    assert_eq!(search.dual, "0.5");
    assert_eq!(next.data[0].variables["gap"], "0.25");
    assert_eq!(ws.journal(&successor).status().unwrap(), JobStatus::Concluded);

    // re-entry on the original follows the chain and reports it as done
    let again = ws
        .driver(backend.clone(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.outcome, DriveOutcome::AlreadyConcluded);
    assert_eq!(again.descriptor, successor);
    assert_eq!(backend.submissions().await.len(), 2);
}

#[tokio::test]
async fn test_jump_escalates_precision() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: dual feasible jump detected\n\
         wrk :: status :: finished\n",
    );
    let backend = ws.backend();

    let report = ws
        .driver(backend, DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    let successor = ws.path("run.count001.yaml");
    assert_eq!(report.successors, vec![successor.clone()]);
    assert_eq!(load(&ws, &successor).await.solver.precision, Some(1600));
}

#[tokio::test]
async fn test_successor_skips_taken_names() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    ws.descriptor("run.count001.yaml", PLAIN_YAML);
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: primal feasible jump detected\n\
         wrk :: status :: finished\n",
    );

    let report = ws
        .driver(ws.backend(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.successors, vec![ws.path("run.count002.yaml")]);
    // the pre-existing file was not overwritten
    let untouched = load(&ws, &ws.path("run.count001.yaml")).await;
    assert_eq!(untouched.solver.precision, Some(800));
}

#[tokio::test]
async fn test_bisection_successor_never_reuses_stale_data() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", &bisection_yaml("0.5", "0.4", "0.6", "0.05"));
    ws.descriptor("run.count001.yaml", PLAIN_YAML);
    std::fs::write(ws.path("gap.count001.json"), "data for gap = 0.45").unwrap();
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: found primal feasible solution\n\
         wrk :: status :: finished\n",
    );

    let report = ws
        .driver(ws.backend(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    let successor = ws.path("run.count002.yaml");
    assert_eq!(report.successors, vec![successor.clone()]);
    let next = load(&ws, &successor).await;
    assert_eq!(next.data[0].filename, "gap.count002.json");
    assert_eq!(next.data[0].variables["gap"], "0.55");
    assert!(!ws.path("gap.count002.json").exists());
    assert_eq!(
        std::fs::read_to_string(ws.path("gap.count001.json")).unwrap(),
        "data for gap = 0.45"
    );
}

#[tokio::test]
async fn test_unrecorded_successor_is_picked_up_again() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", &bisection_yaml("0.5", "0.4", "0.6", "0.05"));
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: found dual feasible solution\n\
         wrk :: status :: finished\n",
    );

    // an earlier run wrote the successor but stopped before recording it
    let current = load(&ws, &path).await;
    let action = decide(
        &current,
        &Outcome::from_journal(&ws.journal(&path)),
        &AnalyzerPolicy::default(),
    )
    .unwrap();
    let written = ws
        .descriptors
        .create(action.successor().unwrap(), &current)
        .await
        .unwrap();
    assert_eq!(written, ws.path("run.count001.yaml"));

    let report = ws
        .driver(ws.backend(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.successors, vec![written.clone()]);
    assert!(!ws.path("run.count002.yaml").exists());
    assert_eq!(
        ws.journal(&path).replaced_with(),
        Some(written.display().to_string().as_str())
    );
}

#[tokio::test]
async fn test_value_outside_bracket_is_fatal() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", &bisection_yaml("0.9", "0.4", "0.6", "0.05"));
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: found primal feasible solution\n\
         wrk :: status :: finished\n",
    );

    let result = ws
        .driver(ws.backend(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await;

    assert!(result.is_err());
    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Failed);
    assert_eq!(journal.failure_kind(), Some(FailureKind::InvalidBisection));
    assert!(!ws.path("run.count001.yaml").exists());
}

#[tokio::test]
async fn test_unknown_reason_fails_job() {
    let ws = Workspace::new();
    let path = ws.descriptor("run.yaml", PLAIN_YAML);
    ws.seed_journal(
        &path,
        "sub :: status :: submitted\nwrk :: terminateReason :: sdpb crashed\nwrk :: status :: finished\n",
    );

    let report = ws
        .driver(ws.backend(), DriverOptions::default())
        .drive(&path, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        DriveOutcome::Failed(Some(FailureKind::UnknownTerminationReason))
    );
    let journal = ws.journal(&path);
    assert_eq!(journal.status().unwrap(), JobStatus::Failed);
    assert!(journal.last_value("error", None).unwrap().contains("sdpb crashed"));
}
