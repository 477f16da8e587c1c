//! Incremental archive engine.
//!
//! One run walks the source tree, stores the bytes of every file whose
//! fingerprint is not yet in the job's history, and records every file in the
//! run's snapshot. The history file is rewritten only after the archive has
//! been finalized, so a failed run never claims content that is not on disk.

use crate::archive::ArchiveWriter;
use crate::config::{ExcludeFilter, JobConfig};
use crate::fingerprint::{hash_reader, Fingerprint, HashingReader};
use crate::history::HistoryStore;
use crate::lock::JobLock;
use crate::snapshot::{entry_name, source_leaf_name, SnapshotBuilder, SNAPSHOT_ENTRY_NAME};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub job: String,
    /// Finalized archive
    pub archive: PathBuf,
    /// Files whose content was stored in this run's archive
    pub new_files: u64,
    /// Files hashed and recorded in the snapshot
    pub visited: u64,
    /// Files skipped by the exclusion pattern
    pub excluded: u64,
    /// Uncompressed bytes of stored file content
    pub bytes_stored: u64,
    /// Archive entries, including the snapshot entry
    pub entries: usize,
    pub archive_size: u64,
    pub history_before: usize,
    pub history_after: usize,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct WalkStats {
    new_files: u64,
    visited: u64,
    excluded: u64,
    bytes_stored: u64,
}

/// Runs a single archive job
#[derive(Debug)]
pub struct ArchiveEngine {
    config: JobConfig,
}

impl ArchiveEngine {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Path of the archive this job writes
    pub fn archive_path(&self) -> PathBuf {
        self.config
            .work_dir
            .join(format!("{}.zip", self.config.job_name))
    }

    fn transient_snapshot_path(&self) -> PathBuf {
        self.config
            .work_dir
            .join(format!("{}.snapshot.json", self.config.job_name))
    }

    /// Execute one incremental run
    pub fn run(&self) -> Result<RunReport> {
        self.run_with(|path: &Path| File::open(path))
    }

    /// Run with `open` supplying the bytes of each source file. It is called
    /// once to fingerprint a file and again to archive it.
    fn run_with<F, R>(&self, mut open: F) -> Result<RunReport>
    where
        F: FnMut(&Path) -> io::Result<R>,
        R: Read,
    {
        let started = Utc::now();

        // Nothing is touched until the source is known to be usable
        let source_root = resolve_source(&self.config.source_dir)?;
        let leaf = source_leaf_name(&self.config.source_dir, &source_root)?;
        let filter = self.config.validate()?;
        let work_root = fs::canonicalize(&self.config.work_dir)?;
        if work_root == source_root {
            return Err(Error::Configuration {
                reason: format!(
                    "work directory {} must not be the source directory",
                    self.config.work_dir.display()
                ),
            });
        }

        let _lock = JobLock::acquire(&self.config.work_dir, &self.config.job_name)?;
        let mut history = HistoryStore::load(&self.config.work_dir, &self.config.job_name)?;
        let history_before = history.len();

        info!(
            "Collecting files from {} excluding pattern {}",
            source_root.display(),
            filter.pattern().unwrap_or("<none>")
        );

        let target = self.archive_path();
        let mut writer = ArchiveWriter::create(
            &target,
            self.config.compression.method,
            self.config.compression.level,
        )?;
        info!("Adding files to {}", target.display());

        let mut snapshot = SnapshotBuilder::new(&self.config.job_name, &leaf);
        let mut stats = WalkStats::default();

        let walk = TreeWalk {
            source_root: &source_root,
            leaf: &leaf,
            work_root: &work_root,
            filter: &filter,
        };
        let filled = walk
            .archive(&mut open, &mut history, &mut snapshot, &mut writer, &mut stats)
            .and_then(|()| {
                if stats.new_files > 0 {
                    self.embed_snapshot(&snapshot, &mut writer)
                } else {
                    Ok(())
                }
            });

        if let Err(e) = filled {
            warn!("Run for job {} failed, discarding archive: {}", self.config.job_name, e);
            writer.discard();
            self.remove_transient_snapshot();
            return Err(e);
        }

        let summary = match writer.finish() {
            Ok(summary) => summary,
            Err(e) => {
                if let Err(rm) = fs::remove_file(&target) {
                    warn!("Failed to remove unfinished archive {}: {}", target.display(), rm);
                }
                return Err(e);
            }
        };

        // Only now is the new content durable
        history.persist()?;

        info!(
            "{} files added, archive size is {} bytes",
            stats.new_files, summary.size
        );

        Ok(RunReport {
            job: self.config.job_name.clone(),
            archive: summary.path,
            new_files: stats.new_files,
            visited: stats.visited,
            excluded: stats.excluded,
            bytes_stored: stats.bytes_stored,
            entries: summary.entries,
            archive_size: summary.size,
            history_before,
            history_after: history.len(),
            started,
            finished: Utc::now(),
        })
    }

    fn embed_snapshot(&self, snapshot: &SnapshotBuilder, writer: &mut ArchiveWriter) -> Result<()> {
        let transient = self.transient_snapshot_path();
        let size = snapshot.write_to(&transient)?;

        writer.write_entry(SNAPSHOT_ENTRY_NAME, size, File::open(&transient)?)?;
        fs::remove_file(&transient)?;

        debug!("Embedded snapshot with {} entries", snapshot.len());
        Ok(())
    }

    fn remove_transient_snapshot(&self) {
        let transient = self.transient_snapshot_path();
        if let Err(e) = fs::remove_file(&transient) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", transient.display(), e);
            }
        }
    }
}

/// Everything a walk needs to know about where it runs
struct TreeWalk<'a> {
    source_root: &'a Path,
    leaf: &'a str,
    work_root: &'a Path,
    filter: &'a ExcludeFilter,
}

impl TreeWalk<'_> {
    fn archive<F, R>(
        &self,
        open: &mut F,
        history: &mut HistoryStore,
        snapshot: &mut SnapshotBuilder,
        writer: &mut ArchiveWriter,
        stats: &mut WalkStats,
    ) -> Result<()>
    where
        F: FnMut(&Path) -> io::Result<R>,
        R: Read,
    {
        // The work directory may live inside the source tree; the run's own
        // archive, lock and history must never be walked.
        let walker = WalkDir::new(self.source_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != self.work_root);

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.filter.is_excluded(&entry.file_name().to_string_lossy()) {
                debug!("Excluded {}", path.display());
                stats.excluded += 1;
                continue;
            }

            let name = entry_name(self.leaf, self.source_root, path)?;
            let fingerprint = hash_reader(open(path)?)?;
            stats.visited += 1;

            if history.record(fingerprint.clone()) {
                let size = entry.metadata()?.len();
                let written = store_file(writer, &name, path, size, open(path)?, &fingerprint)?;

                stats.new_files += 1;
                stats.bytes_stored += written;
            } else {
                debug!("Unchanged {} ({})", name, fingerprint);
            }

            snapshot.add(fingerprint, name);
        }

        Ok(())
    }
}

/// Archive `reader` under `name`, checking that the bytes written are the
/// bytes that were fingerprinted
fn store_file<R: Read>(
    writer: &mut ArchiveWriter,
    name: &str,
    path: &Path,
    size: u64,
    reader: R,
    fingerprint: &Fingerprint,
) -> Result<u64> {
    let mut reader = HashingReader::new(reader);
    let written = writer.write_entry(name, size, &mut reader)?;

    if reader.finish() != *fingerprint {
        return Err(Error::SourceChanged {
            path: path.to_path_buf(),
        });
    }
    Ok(written)
}

fn resolve_source(source_dir: &Path) -> Result<PathBuf> {
    let not_found = || Error::SourceNotFound {
        path: source_dir.to_path_buf(),
    };

    let root = fs::canonicalize(source_dir).map_err(|_| not_found())?;
    if !root.is_dir() {
        return Err(not_found());
    }
    fs::read_dir(&root).map_err(|_| not_found())?;
    Ok(root)
}
