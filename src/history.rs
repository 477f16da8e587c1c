//! Cross-run dedup history.
//!
//! A job's history is the set of fingerprints whose bytes already live in some
//! archive produced for that job. It only ever grows. On disk it is a plain
//! text file with one fingerprint per line, rewritten wholesale at the end of
//! every successful run.

use crate::fingerprint::Fingerprint;
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extension of history files
pub const HISTORY_EXTENSION: &str = "history";

/// Path of the history file for a job
pub fn history_path(work_dir: &Path, job_name: &str) -> PathBuf {
    work_dir.join(format!("{}.{}", job_name, HISTORY_EXTENSION))
}

/// In-memory history set bound to its file on disk
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    fingerprints: HashSet<Fingerprint>,
}

impl HistoryStore {
    /// Load the history for a job. A missing file yields an empty history.
    pub fn load(work_dir: &Path, job_name: &str) -> Result<Self> {
        let path = history_path(work_dir, job_name);

        if !path.exists() {
            info!(
                "History file {} not found, assuming full backup",
                path.display()
            );
            return Ok(Self {
                path,
                fingerprints: HashSet::new(),
            });
        }

        info!("Loading history from {}", path.display());
        let content = fs::read_to_string(&path)?;
        let mut fingerprints = HashSet::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fp = Fingerprint::parse(line).map_err(|e| Error::InvalidHistory {
                path: path.clone(),
                line: index + 1,
                reason: e.to_string(),
            })?;
            fingerprints.insert(fp);
        }

        debug!("Loaded {} fingerprints", fingerprints.len());
        Ok(Self { path, fingerprints })
    }

    /// Membership check
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.fingerprints.contains(fp)
    }

    /// Add a fingerprint. Returns `true` if it was not already present.
    pub fn record(&mut self, fp: Fingerprint) -> bool {
        self.fingerprints.insert(fp)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.fingerprints.iter()
    }

    /// Write the full set back, replacing the previous file atomically.
    ///
    /// Must only be called once the archive holding the new fingerprints has
    /// been finalized.
    pub fn persist(&self) -> Result<()> {
        let mut sorted: Vec<&Fingerprint> = self.fingerprints.iter().collect();
        sorted.sort();

        let temp_path = self.path.with_extension(format!("{}.tmp", HISTORY_EXTENSION));

        // Write to temporary location first
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            for fp in &sorted {
                writeln!(writer, "{}", fp)?;
            }
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        // Atomically move to final location
        fs::rename(&temp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            sync_dir(parent)?;
        }

        info!(
            "Saved {} fingerprints to {}",
            sorted.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Flush a directory entry so a rename inside it survives power loss
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    File::open(dir)?.sync_all()?;
    Ok(())
}

// Directories cannot be opened as files on Windows; NTFS journals the rename.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
