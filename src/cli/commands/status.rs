//! Implementation of the `babysitter status` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::{CliContext, Inputs};
use crate::cli::display::{colorize_status, list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::journal::keys;
use crate::domain::models::JobStatus;
use crate::domain::ports::JournalStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Job descriptor files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct JobStatusLine {
    pub descriptor: PathBuf,
    pub status: String,
    pub submissions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_with: Option<String>,
    /// A forced resubmission may get past the failure
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub jobs: Vec<JobStatusLine>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["descriptor", "status", "subs", "reason", "note"]);
        for job in &self.jobs {
            let note = match (&job.replaced_with, &job.error_kind) {
                (Some(next), _) => format!("replaced by {next}"),
                (None, Some(kind)) if job.retryable => format!("{kind}, retry with --force"),
                (None, Some(kind)) => kind.clone(),
                (None, None) => String::new(),
            };
            table.add_row(vec![
                job.descriptor.display().to_string(),
                colorize_status(&job.status).to_string(),
                job.submissions.to_string(),
                truncate(job.reason.as_deref().unwrap_or(""), 40),
                note,
            ]);
        }
        render_list("job", &table, self.jobs.len())
    }
}

pub async fn execute(args: StatusArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    let inputs = Inputs::partition(args.files);

    let mut jobs = Vec::with_capacity(inputs.found.len());
    for path in &inputs.found {
        let journal = ctx.journals.load(path).await?;
        let status = journal
            .status()
            .map_or_else(|err| format!("corrupt ({})", err.0), |s| s.to_string());
        let error_kind = journal.failure_kind();
        let failed = journal.status().ok() == Some(JobStatus::Failed);
        jobs.push(JobStatusLine {
            descriptor: path.clone(),
            status,
            submissions: journal.submission_count(),
            reason: journal
                .last_value(keys::TERMINATE_REASON, None)
                .map(str::to_string),
            error_kind: error_kind.filter(|_| failed).map(|k| k.to_string()),
            replaced_with: journal.replaced_with().map(str::to_string),
            retryable: failed && error_kind.is_some_and(|k| k.is_transient()),
        });
    }

    output(&StatusOutput { jobs }, json_mode);
    inputs.finish()
}
