//! Per-job lock so two runs never share a history or archive.
//!
//! The lock is an OS advisory lock held on `<job>.lock` for the lifetime of
//! the run. The operating system drops it when the process exits, so a lock
//! file left behind by a killed run does not block the next one.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock on a job, released on drop
#[derive(Debug)]
pub struct JobLock {
    path: PathBuf,
    file: File,
}

impl JobLock {
    /// Acquire the lock for `job_name` inside `work_dir` without blocking.
    ///
    /// Fails with [`Error::JobLocked`] while another live run holds it.
    pub fn acquire(work_dir: &Path, job_name: &str) -> Result<Self> {
        let path = work_dir.join(format!("{}.lock", job_name));

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Err(Error::JobLocked {
                    job: job_name.to_string(),
                    path,
                });
            }
            return Err(e.into());
        }

        // The file itself is never removed: unlinking a locked file lets a
        // waiting run lock an orphaned inode.
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired job lock {}", path.display());

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for JobLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
