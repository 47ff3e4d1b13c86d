//! Implementation of the `babysitter babysit` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::application::{Babysitter, JobResult};
use crate::cli::context::{CliContext, Inputs};
use crate::cli::display::{colorize_status, create_spinner, list_table, output, render_list, CommandOutput};
use crate::services::{DriveOutcome, DriverOptions, LifecycleDriver};

#[derive(Args, Debug)]
pub struct BabysitArgs {
    /// Job descriptor files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Execution backend: local, batch or noop (defaults to the configured one)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Refuse to submit a descriptor more than N times (0 disables the check)
    #[arg(long)]
    pub max_submissions: Option<u32>,

    /// Block until submitted jobs complete and keep going
    #[arg(short, long)]
    pub wait: bool,

    /// Ask the backend whether jobs recorded as in flight are still alive
    #[arg(long)]
    pub really_running: bool,

    /// Resubmit failed jobs
    #[arg(short, long)]
    pub force: bool,

    /// Number of descriptors processed concurrently
    #[arg(long)]
    pub jobs: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct JobLine {
    pub requested: PathBuf,
    pub descriptor: Option<PathBuf>,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    pub submissions: usize,
    pub successors: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobResult> for JobLine {
    fn from(job: JobResult) -> Self {
        match job.result {
            Ok(report) => Self {
                requested: job.path,
                descriptor: Some(report.descriptor),
                outcome: report.outcome.as_str().to_string(),
                failure_kind: match report.outcome {
                    DriveOutcome::Failed(kind) => kind.map(|k| k.to_string()),
                    _ => None,
                },
                submissions: report.submissions,
                successors: report.successors,
                error: None,
            },
            Err(err) => Self {
                requested: job.path,
                descriptor: None,
                outcome: "error".to_string(),
                failure_kind: None,
                submissions: 0,
                successors: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BabysitOutput {
    pub jobs: Vec<JobLine>,
    pub missing: Vec<PathBuf>,
}

impl CommandOutput for BabysitOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["descriptor", "outcome", "submitted", "detail"]);
        for job in &self.jobs {
            let shown = job.descriptor.as_ref().unwrap_or(&job.requested);
            let detail = job
                .error
                .clone()
                .or_else(|| job.failure_kind.clone())
                .unwrap_or_else(|| match job.successors.len() {
                    0 => String::new(),
                    n => format!("{n} successor(s)"),
                });
            table.add_row(vec![
                shown.display().to_string(),
                colorize_status(&job.outcome).to_string(),
                job.submissions.to_string(),
                detail,
            ]);
        }
        let mut text = render_list("job", &table, self.jobs.len());
        for path in &self.missing {
            text.push_str(&format!("\nnot found: {}", path.display()));
        }
        text
    }
}

pub async fn execute(args: BabysitArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    let inputs = Inputs::partition(args.files);
    let config = &ctx.config;

    let options = DriverOptions {
        wait: args.wait,
        really_running: args.really_running,
        force: args.force,
        max_submissions: match args.max_submissions {
            Some(0) => None,
            Some(n) => Some(n),
            None => config.submission_ceiling(),
        },
        max_iterations: config.driver.max_iterations,
    };
    let driver = LifecycleDriver::new(
        ctx.backend(args.backend.as_deref())?,
        ctx.journals.clone(),
        ctx.descriptors.clone(),
        ctx.policy()?,
        options,
    );
    let concurrency = args.jobs.unwrap_or(config.driver.concurrency).clamp(1, 256);
    let babysitter = Babysitter::new(Arc::new(driver), concurrency);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, leaving in-flight jobs to the backend");
            on_signal.cancel();
        }
    });

    let spinner = (!json_mode && args.wait)
        .then(|| create_spinner(format!("babysitting {} job(s)", inputs.found.len())));
    let results = babysitter.run(inputs.found.clone(), cancel).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let jobs: Vec<JobLine> = results.into_iter().map(JobLine::from).collect();
    let errors = jobs.iter().filter(|job| job.error.is_some()).count();
    output(
        &BabysitOutput {
            jobs,
            missing: inputs.missing.clone(),
        },
        json_mode,
    );

    if errors > 0 {
        anyhow::bail!("{errors} job(s) stopped with an error");
    }
    inputs.finish()
}
