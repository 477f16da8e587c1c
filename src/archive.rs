//! Zip archive writer.
//!
//! Thin adapter over `zip::ZipWriter` that streams entries in bounded chunks,
//! declares each entry's size up front and refuses duplicate entry names.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Copy buffer size for entry bodies (64 KiB)
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Compression applied to archive entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Stored,
}

/// Summary of a finalized archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: usize,
    pub size: u64,
}

/// Sequential writer for a single zip archive
pub struct ArchiveWriter {
    path: PathBuf,
    zip: ZipWriter<BufWriter<File>>,
    options: SimpleFileOptions,
    names: HashSet<String>,
}

impl ArchiveWriter {
    /// Create a fresh archive at `path`, deleting whatever was there before
    pub fn create(path: &Path, compression: Compression, level: Option<i64>) -> Result<Self> {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed stale archive {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = File::create(path)?;
        let options = match compression {
            Compression::Deflate => SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(level),
            Compression::Stored => {
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            zip: ZipWriter::new(BufWriter::new(file)),
            options,
            names: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.names.len()
    }

    /// Stream `reader` into a new entry called `name`.
    ///
    /// `size_hint` is declared in the entry header before the body is written.
    /// Returns the number of bytes copied.
    pub fn write_entry<R: Read>(&mut self, name: &str, size_hint: u64, mut reader: R) -> Result<u64> {
        if !self.names.insert(name.to_string()) {
            return Err(Error::DuplicateEntry {
                name: name.to_string(),
            });
        }

        let options = self.options.large_file(size_hint >= u64::from(u32::MAX));
        self.zip.start_file(name, options)?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut written = 0u64;
        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.zip.write_all(&buffer[..bytes_read])?;
            written += bytes_read as u64;
        }

        debug!("Added {} ({} bytes)", name, written);
        Ok(written)
    }

    /// Write the central directory and flush the archive to disk
    pub fn finish(self) -> Result<ArchiveSummary> {
        let entries = self.names.len();
        let writer = self.zip.finish()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let size = fs::metadata(&self.path)?.len();
        Ok(ArchiveSummary {
            path: self.path,
            entries,
            size,
        })
    }

    /// Abandon the archive and remove the partial file
    pub fn discard(self) {
        let path = self.path;
        drop(self.zip);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove partial archive {}: {}", path.display(), e);
            }
        }
    }
}

/// Read a single entry from an existing archive, `None` if it is absent
pub fn read_entry(path: &Path, name: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data)?;
    Ok(Some(data))
}

/// Names of all entries in an existing archive, in archive order
pub fn list_entries(path: &Path) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        names.push(archive.by_index(index)?.name().to_string());
    }
    Ok(names)
}
