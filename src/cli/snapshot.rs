//! Snapshot command implementation for inspecting archives.

use crate::archive::list_entries;
use crate::snapshot::{Snapshot, SNAPSHOT_ENTRY_NAME};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the snapshot command
#[derive(Args)]
pub struct SnapshotArgs {
    /// Archive produced by a previous run
    #[arg(short, long)]
    pub archive: PathBuf,

    /// Output format (summary, json)
    #[arg(long, default_value = "summary")]
    pub format: String,
}

/// Run the snapshot command
pub async fn run(args: SnapshotArgs) -> Result<()> {
    let archive = args.archive.clone();
    let (snapshot, entries) = tokio::task::spawn_blocking(move || {
        let snapshot = Snapshot::from_archive(&archive)?;
        let entries = list_entries(&archive)?;
        Ok::<_, crate::Error>((snapshot, entries))
    })
    .await
    .context("Snapshot task panicked")?
    .with_context(|| format!("Failed to read {}", args.archive.display()))?;

    let Some(snapshot) = snapshot else {
        println!(
            "{} has no {} entry: the run found nothing new to archive",
            args.archive.display(),
            SNAPSHOT_ENTRY_NAME
        );
        return Ok(());
    };

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        _ => {
            let stored = entries.iter().filter(|n| *n != SNAPSHOT_ENTRY_NAME).count();
            println!("Snapshot {}", snapshot.id);
            println!("  Job: {}", snapshot.job);
            println!("  Created: {}", snapshot.created.format("%Y-%m-%d %H:%M:%S"));
            println!("  Source: {}", snapshot.source);
            println!("  Files: {}", snapshot.entries.len());
            println!("  Stored in this archive: {}", stored);
            println!();
            for entry in &snapshot.entries {
                let marker = if entries.contains(&entry.path) { "+" } else { " " };
                println!("{} {}  {}", marker, entry.md5, entry.path);
            }
        }
    }

    Ok(())
}
