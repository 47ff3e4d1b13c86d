//! Implementation of the `babysitter cleanup` command.
//!
//! Removes descriptors (and their journals) that were concluded and replaced by
//! a successor that still exists. The chain's last descriptor always stays.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::context::{CliContext, Inputs};
use crate::cli::display::{action_success, output, CommandOutput};
use crate::domain::models::{JobStatus, Journal};
use crate::domain::ports::{DescriptorStore, JournalStore};

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Job descriptor files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Only list what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct CleanupOutput {
    pub dry_run: bool,
    pub removed: Vec<PathBuf>,
    pub kept: usize,
}

impl CommandOutput for CleanupOutput {
    fn to_human(&self) -> String {
        let verb = if self.dry_run { "Would remove" } else { "Removed" };
        let mut lines = vec![action_success(&format!(
            "{verb} {} superseded descriptor(s), kept {}",
            self.removed.len(),
            self.kept
        ))];
        lines.extend(self.removed.iter().map(|p| format!("  - {}", p.display())));
        lines.join("\n")
    }
}

/// The journal marks the descriptor as superseded by an existing successor.
pub async fn is_superseded(ctx: &CliContext, journal: &Journal) -> Result<bool> {
    if journal.status().ok() != Some(JobStatus::Concluded) {
        return Ok(false);
    }
    match journal.replaced_with() {
        Some(next) => Ok(ctx.descriptors.exists(Path::new(next.trim())).await?),
        None => Ok(false),
    }
}

pub async fn execute(args: CleanupArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    let inputs = Inputs::partition(args.files);

    let mut removed = Vec::new();
    let mut kept = 0;
    for path in &inputs.found {
        let journal = ctx.journals.load(path).await?;
        if !is_superseded(ctx, &journal).await? {
            kept += 1;
            continue;
        }
        if !args.dry_run {
            ctx.descriptors.remove(path).await?;
            ctx.journals.remove(path).await?;
            tracing::info!(descriptor = %path.display(), "removed superseded descriptor");
        }
        removed.push(path.clone());
    }

    output(
        &CleanupOutput {
            dry_run: args.dry_run,
            removed,
            kept,
        },
        json_mode,
    );
    inputs.finish()
}
