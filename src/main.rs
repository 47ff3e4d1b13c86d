//! Babysitter CLI entry point.

use anyhow::Result;
use clap::Parser;

use babysitter::cli::{handle_error, Cli, CliContext, Commands};
use babysitter::infrastructure::config::ConfigLoader;
use babysitter::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = run(cli).await {
        handle_error(&err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let mut log_config = LogConfig::from(&config.logging);
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logger = LoggerImpl::init(&log_config)?;

    let ctx = CliContext::new(config, cli.config.clone());
    match cli.command {
        Commands::Babysit(args) => babysitter::cli::commands::babysit::execute(args, &ctx, cli.json).await,
        Commands::Worker(args) => babysitter::cli::commands::worker::execute(args, &ctx, cli.json).await,
        Commands::Analyze(args) => babysitter::cli::commands::analyze::execute(args, &ctx, cli.json).await,
        Commands::Status(args) => babysitter::cli::commands::status::execute(args, &ctx, cli.json).await,
        Commands::Inspect(args) => babysitter::cli::commands::inspect::execute(args, &ctx, cli.json).await,
        Commands::Cleanup(args) => babysitter::cli::commands::cleanup::execute(args, &ctx, cli.json).await,
    }
}
