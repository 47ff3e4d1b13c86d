//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{
    analyze::AnalyzeArgs, babysit::BabysitArgs, cleanup::CleanupArgs, inspect::InspectArgs,
    status::StatusArgs, worker::WorkerArgs,
};

#[derive(Parser)]
#[command(name = "babysitter")]
#[command(about = "Babysitter - adaptive resubmission of long-running solver jobs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (replaces .babysitter/config.yaml and local.yaml)
    #[arg(short, long, global = true, env = "BABYSITTER_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive job descriptors through submission, analysis and resubmission
    Babysit(BabysitArgs),

    /// Run one job in place (compute node side)
    Worker(WorkerArgs),

    /// Show what the next step of finished jobs would be
    Analyze(AnalyzeArgs),

    /// Show job status from the journals
    Status(StatusArgs),

    /// Print a journal or descriptor entry for many jobs
    Inspect(InspectArgs),

    /// Remove descriptors that were concluded and replaced by a successor
    Cleanup(CleanupArgs),
}
