//! Implementation of the `babysitter worker` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::{SubmissionWait, Worker, WorkerOutcome};
use crate::cli::context::CliContext;
use crate::cli::display::{action_failure, action_success, output, CommandOutput};

const SUBMISSION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Job descriptor file
    pub file: PathBuf,

    /// Backend providing staging and tool invocation (defaults to the configured one)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Wait for the submitting driver to record the submission before starting
    #[arg(long)]
    pub await_submission: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkerOutput {
    pub descriptor: PathBuf,
    pub outcome: WorkerOutcome,
}

impl CommandOutput for WorkerOutput {
    fn to_human(&self) -> String {
        let name = self.descriptor.display();
        match &self.outcome {
            WorkerOutcome::Finished(reason) => action_success(&format!(
                "{name}: {}",
                reason.as_deref().unwrap_or("finished without a termination reason")
            )),
            WorkerOutcome::Failed(kind) => action_failure(&format!("{name}: {kind}")),
        }
    }
}

pub async fn execute(args: WorkerArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    if !args.file.is_file() {
        anyhow::bail!("Descriptor not found: {}", args.file.display());
    }
    let mut worker = Worker::new(
        ctx.backend(args.backend.as_deref())?,
        ctx.journals.clone(),
        ctx.descriptors.clone(),
    );
    if args.await_submission {
        worker = worker.await_submission(SubmissionWait {
            poll_interval: Duration::from_millis(ctx.config.driver.poll_interval_ms.min(1000)),
            timeout: SUBMISSION_TIMEOUT,
        });
    }
    let outcome = worker
        .run(&args.file)
        .await
        .with_context(|| format!("Worker failed on {}", args.file.display()))?;

    let failed = matches!(outcome, WorkerOutcome::Failed(_));
    output(
        &WorkerOutput {
            descriptor: args.file,
            outcome,
        },
        json_mode,
    );
    if failed {
        anyhow::bail!("job failed; see its journal");
    }
    Ok(())
}
