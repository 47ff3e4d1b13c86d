//! Implementation of the `babysitter analyze` command.
//!
//! A dry run of the decision engine: nothing is written unless `--resubmit`
//! is given, which marks jobs whose run ran out of budget as `tosubmit`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::{CliContext, Inputs};
use crate::cli::display::{list_table, output, render_list, CommandOutput};
use crate::domain::models::journal::sources;
use crate::domain::models::{JobStatus, JournalEntry, Outcome};
use crate::domain::ports::{DescriptorStore, JournalStore};
use crate::services::{decide, Action, AnalyzerPolicy};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Job descriptor files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Mark jobs that should simply be resubmitted as `tosubmit`
    #[arg(long)]
    pub resubmit: bool,
}

#[derive(Debug, Serialize)]
pub struct Analysis {
    pub descriptor: PathBuf,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successor: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub marked: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeOutput {
    pub jobs: Vec<Analysis>,
}

impl CommandOutput for AnalyzeOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["descriptor", "reason", "action", "next"]);
        for job in &self.jobs {
            let action = job
                .action
                .clone()
                .or_else(|| job.error.clone())
                .unwrap_or_else(|| format!("({})", job.status));
            let next = match (&job.successor, job.marked) {
                (Some(path), _) => path.display().to_string(),
                (None, true) => "marked tosubmit".to_string(),
                (None, false) => String::new(),
            };
            table.add_row(vec![
                job.descriptor.display().to_string(),
                job.reason.clone().unwrap_or_default(),
                action,
                next,
            ]);
        }
        render_list("job", &table, self.jobs.len())
    }
}

async fn analyze(
    ctx: &CliContext,
    policy: &AnalyzerPolicy,
    path: PathBuf,
    resubmit: bool,
) -> Analysis {
    let mut analysis = Analysis {
        descriptor: path,
        status: String::new(),
        reason: None,
        action: None,
        successor: None,
        error: None,
        marked: false,
    };
    let path = analysis.descriptor.clone();

    let descriptor = match ctx.descriptors.load(&path).await {
        Ok(descriptor) => descriptor,
        Err(err) => {
            analysis.error = Some(err.to_string());
            return analysis;
        }
    };
    let journal = match ctx.journals.load(&path).await {
        Ok(journal) => journal,
        Err(err) => {
            analysis.error = Some(err.to_string());
            return analysis;
        }
    };
    let status = match journal.status() {
        Ok(status) => status,
        Err(err) => {
            analysis.error = Some(err.to_string());
            return analysis;
        }
    };
    analysis.status = status.to_string();
    if status != JobStatus::Finished {
        return analysis;
    }

    let outcome = Outcome::from_journal(&journal);
    analysis.reason.clone_from(&outcome.termination_reason);
    match decide(&descriptor, &outcome, policy) {
        Ok(action) => {
            analysis.action = Some(action.label().to_string());
            analysis.successor = action.successor().map(|next| next.path().to_path_buf());
            if resubmit && matches!(action, Action::Resubmit) {
                let entry = JournalEntry::status(sources::OPERATOR, JobStatus::ToSubmit);
                match ctx.journals.append(&path, &entry).await {
                    Ok(()) => analysis.marked = true,
                    Err(err) => analysis.error = Some(err.to_string()),
                }
            }
        }
        Err(err) => analysis.error = Some(err.to_string()),
    }
    analysis
}

pub async fn execute(args: AnalyzeArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    let inputs = Inputs::partition(args.files);
    let policy = ctx.policy()?;

    let mut jobs = Vec::with_capacity(inputs.found.len());
    for path in inputs.found.clone() {
        jobs.push(analyze(ctx, &policy, path, args.resubmit).await);
    }
    output(&AnalyzeOutput { jobs }, json_mode);
    inputs.finish()
}
