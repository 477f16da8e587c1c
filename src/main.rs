//! nova-archiver - incremental, content-deduplicating zip archiver
//!
//! Main binary entry point for the command-line interface.

use anyhow::Result;
use clap::Parser;
use nova_archiver::cli::{Cli, Commands};
use nova_archiver::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.log_file {
        Some(path) => logging::init_file_logging(path, cli.verbose)?,
        None => logging::init_logging(cli.verbose),
    }

    match cli.command {
        Commands::Run(args) => nova_archiver::cli::run::run(args).await,
        Commands::Snapshot(args) => nova_archiver::cli::snapshot::run(args).await,
        Commands::History(args) => nova_archiver::cli::history::run(args).await,
    }
}
