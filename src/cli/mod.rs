//! Command-line interface for nova-archiver.
//!
//! Subcommands run an archive job and inspect what earlier runs left behind.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod history;
pub mod run;
pub mod snapshot;

/// nova-archiver - incremental, content-deduplicating zip archiver
#[derive(Parser)]
#[command(name = "nova-archiver")]
#[command(about = "Incremental, content-deduplicating zip archiver with per-run snapshots")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Archive new content of a source directory
    Run(run::RunArgs),
    /// Show the snapshot embedded in an archive
    Snapshot(snapshot::SnapshotArgs),
    /// Show the dedup history of a job
    History(history::HistoryArgs),
}

/// Human-readable byte count
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::parse_from([
            "nova-archiver",
            "run",
            "--job",
            "docs",
            "--source",
            "/data/docs",
            "--work-dir",
            "/backups",
            "--exclude",
            r".*\.tmp",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.job.as_deref(), Some("docs"));
                assert_eq!(args.exclude.as_deref(), Some(r".*\.tmp"));
            }
            _ => panic!("expected run command"),
        }
    }
}
