//! Run command implementation.

use crate::archive::Compression;
use crate::cli::format_bytes;
use crate::config::JobConfig;
use crate::engine::{ArchiveEngine, RunReport};
use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// TOML job file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Job name, used to name the history and archive files
    #[arg(short, long)]
    pub job: Option<String>,

    /// Source directory to archive
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Directory holding history and archive files
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Regex matched against whole file names to skip
    #[arg(short, long)]
    pub exclude: Option<String>,

    /// Store entries without compression
    #[arg(long)]
    pub stored: bool,

    /// Deflate level (0-9)
    #[arg(long, conflicts_with = "stored")]
    pub level: Option<i64>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Merge the job file (if any) with command-line overrides
    pub fn job_config(&self) -> Result<JobConfig> {
        let mut config = match &self.config {
            Some(path) => JobConfig::load(path)
                .with_context(|| format!("Failed to load job file {}", path.display()))?,
            None => {
                let (Some(job), Some(source), Some(work_dir)) =
                    (&self.job, &self.source, &self.work_dir)
                else {
                    bail!("--job, --source and --work-dir are required without --config");
                };
                JobConfig::new(job, source, work_dir)
            }
        };

        if let Some(job) = &self.job {
            config.job_name = job.clone();
        }
        if let Some(source) = &self.source {
            config.source_dir = source.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            config.work_dir = work_dir.clone();
        }
        if let Some(exclude) = &self.exclude {
            config.exclude = Some(exclude.clone());
        }
        if self.stored {
            config.compression.method = Compression::Stored;
        }
        if self.level.is_some() {
            config.compression.method = Compression::Deflate;
            config.compression.level = self.level;
        }

        Ok(config)
    }
}

/// Run the archive job
pub async fn run(args: RunArgs) -> Result<()> {
    let config = args.job_config()?;
    let job = config.job_name.clone();
    let engine = ArchiveEngine::new(config);

    let report = tokio::task::spawn_blocking(move || engine.run())
        .await
        .context("Archive task panicked")?
        .with_context(|| format!("Run for job {} failed", job))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    if report.new_files == 0 {
        println!("Nothing new to archive for job {}", report.job);
    } else {
        println!("Archive completed successfully!");
    }
    println!("  Archive: {}", report.archive.display());
    println!("  New files: {}", report.new_files);
    println!("  Files in snapshot: {}", report.visited);
    println!("  Excluded: {}", report.excluded);
    println!("  Content stored: {}", format_bytes(report.bytes_stored));
    println!("  Archive size: {}", format_bytes(report.archive_size));
    println!(
        "  History: {} -> {} fingerprints",
        report.history_before, report.history_after
    );
    println!(
        "  Duration: {:.1}s",
        (report.finished - report.started).num_milliseconds() as f64 / 1000.0
    );
}
