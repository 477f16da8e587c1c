//! Per-run snapshot manifest.
//!
//! A snapshot lists every file seen during a run with its fingerprint, whether
//! or not its bytes were stored in that run's archive. Paths are rooted at the
//! source directory's own name so manifests stay portable between machines.

use crate::archive::read_entry;
use crate::fingerprint::Fingerprint;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use uuid::Uuid;

/// Snapshot document format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Reserved archive entry name holding the serialized snapshot
pub const SNAPSHOT_ENTRY_NAME: &str = "snapshot.json";

/// One file in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Path rooted at the source directory's leaf name, `/` separated
    pub path: String,
    /// Content fingerprint
    pub md5: Fingerprint,
}

/// Serialized snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Document format version
    pub version: u32,
    /// Unique snapshot identifier
    pub id: Uuid,
    /// Job that produced this snapshot
    pub job: String,
    /// Snapshot creation timestamp
    pub created: DateTime<Utc>,
    /// Leaf name of the source directory
    pub source: String,
    /// All files present at the time of the run
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Parse a snapshot document
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_slice(data)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(Error::InvalidSnapshot {
                reason: format!(
                    "unsupported version {} (newest known is {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }
        Ok(snapshot)
    }

    /// Read the snapshot embedded in an archive, `None` if the archive has none
    pub fn from_archive(archive_path: &Path) -> Result<Option<Self>> {
        match read_entry(archive_path, SNAPSHOT_ENTRY_NAME)? {
            Some(data) => Ok(Some(Self::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Find an entry by its rooted path
    pub fn find(&self, path: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

/// Accumulates snapshot entries during a run
#[derive(Debug)]
pub struct SnapshotBuilder {
    job: String,
    source: String,
    entries: Vec<SnapshotEntry>,
}

impl SnapshotBuilder {
    pub fn new(job: &str, source: &str) -> Self {
        Self {
            job: job.to_string(),
            source: source.to_string(),
            entries: Vec::new(),
        }
    }

    /// Record a visited file. Entries are never merged by path or hash.
    pub fn add(&mut self, md5: Fingerprint, path: String) {
        self.entries.push(SnapshotEntry { path, md5 });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    /// Freeze the collected entries into a snapshot document
    pub fn build(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4(),
            job: self.job.clone(),
            created: Utc::now(),
            source: self.source.clone(),
            entries: self.entries.clone(),
        }
    }

    /// Serialize the snapshot to JSON
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.build())?)
    }

    /// Serialize the snapshot into a file, returning its size in bytes
    pub fn write_to(&self, path: &Path) -> Result<u64> {
        let data = self.serialize()?;
        fs::write(path, &data)?;
        Ok(data.len() as u64)
    }
}

/// Leaf name every entry path is rooted at.
///
/// This is the configured directory's own name, so a source reached through a
/// symlink keeps the link's name. Only when the configured path ends in `.` or
/// `..` is the name taken from the resolved directory instead.
pub fn source_leaf_name(configured: &Path, resolved: &Path) -> Result<String> {
    let leaf = configured
        .file_name()
        .or_else(|| resolved.file_name())
        .ok_or_else(|| Error::Configuration {
            reason: format!(
                "source directory {} has no usable name",
                configured.display()
            ),
        })?;

    leaf.to_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Configuration {
            reason: format!(
                "source directory name {} is not valid UTF-8",
                leaf.to_string_lossy()
            ),
        })
}

/// Build the rooted entry name for a file below `source_root`.
///
/// With leaf `project`, `/data/project/sub/file.txt` under `/data/project`
/// becomes `project/sub/file.txt`. Names that are not valid UTF-8 are
/// rejected rather than mangled, since two of them could collapse into the
/// same entry name.
pub fn entry_name(leaf: &str, source_root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(source_root)
        .map_err(|_| Error::Configuration {
            reason: format!(
                "{} is not inside {}",
                path.display(),
                source_root.display()
            ),
        })?;

    let mut parts = vec![leaf.to_string()];
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| Error::Configuration {
                    reason: format!("file name is not valid UTF-8: {}", path.display()),
                })?;
                parts.push(part.to_string());
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::Configuration {
                    reason: format!("unexpected path component in {}", path.display()),
                })
            }
        }
    }

    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_entry_name_is_rooted_at_leaf() {
        let root = PathBuf::from("/data/project");
        let file = root.join("sub").join("file.txt");

        assert_eq!(
            entry_name("project", &root, &file).unwrap(),
            "project/sub/file.txt"
        );
        assert_eq!(
            entry_name("project", &root, &root.join("top.txt")).unwrap(),
            "project/top.txt"
        );
    }

    #[test]
    fn test_entry_name_outside_root_fails() {
        let root = PathBuf::from("/data/project");
        assert!(entry_name("project", &root, Path::new("/elsewhere/file.txt")).is_err());
    }

    #[test]
    fn test_leaf_comes_from_configured_path() {
        let resolved = Path::new("/data/project-v3");
        assert_eq!(
            source_leaf_name(Path::new("/data/current"), resolved).unwrap(),
            "current"
        );
        assert_eq!(
            source_leaf_name(Path::new("/data/current/."), resolved).unwrap(),
            "current"
        );
        assert_eq!(
            source_leaf_name(Path::new("/data/current/sub/.."), resolved).unwrap(),
            "project-v3"
        );
    }

    #[test]
    fn test_root_without_name_fails() {
        assert!(source_leaf_name(Path::new("/"), Path::new("/")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = PathBuf::from("/data/project");
        let first = root.join(OsStr::from_bytes(b"caf\xe9.txt"));
        let second = root.join(OsStr::from_bytes(b"caf\xff.txt"));

        assert!(matches!(
            entry_name("project", &root, &first),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            entry_name("project", &root, &second),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_builder_keeps_every_entry() {
        let mut builder = SnapshotBuilder::new("job", "project");
        let fp = Fingerprint::from_bytes(b"hello");
        builder.add(fp.clone(), "project/a.txt".to_string());
        builder.add(fp.clone(), "project/b.txt".to_string());

        assert_eq!(builder.len(), 2);
        assert!(builder.entries().iter().all(|e| e.md5 == fp));
    }

    #[test]
    fn test_serialized_schema() {
        let mut builder = SnapshotBuilder::new("job", "project");
        builder.add(Fingerprint::from_bytes(b"hello"), "project/a.txt".to_string());

        let value: serde_json::Value = serde_json::from_slice(&builder.serialize().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["job"], "job");
        assert_eq!(value["source"], "project");
        assert_eq!(value["entries"][0]["path"], "project/a.txt");
        assert_eq!(
            value["entries"][0]["md5"],
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn test_parse_rejects_future_version() {
        let mut doc: serde_json::Value =
            serde_json::from_slice(&SnapshotBuilder::new("j", "s").serialize().unwrap()).unwrap();
        doc["version"] = serde_json::json!(SNAPSHOT_VERSION + 1);

        let result = Snapshot::from_slice(&serde_json::to_vec(&doc).unwrap());
        assert!(matches!(result, Err(Error::InvalidSnapshot { .. })));
    }
}
