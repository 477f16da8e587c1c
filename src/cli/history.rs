//! History command implementation.

use crate::history::HistoryStore;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the history command
#[derive(Args)]
pub struct HistoryArgs {
    /// Directory holding history and archive files
    #[arg(short, long)]
    pub work_dir: PathBuf,

    /// Job name
    #[arg(short, long)]
    pub job: String,

    /// Print every fingerprint
    #[arg(long)]
    pub list: bool,
}

/// Run the history command
pub async fn run(args: HistoryArgs) -> Result<()> {
    let history = HistoryStore::load(&args.work_dir, &args.job)
        .with_context(|| format!("Failed to load history for job {}", args.job))?;

    if history.is_empty() {
        println!("No history for job {}: next run is a full backup", args.job);
        return Ok(());
    }

    println!(
        "Job {}: {} archived fingerprints ({})",
        args.job,
        history.len(),
        history.path().display()
    );

    if args.list {
        let mut fingerprints: Vec<_> = history.iter().collect();
        fingerprints.sort();
        for fp in fingerprints {
            println!("{}", fp);
        }
    }

    Ok(())
}
