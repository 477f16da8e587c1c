//! # nova-archiver
//!
//! Incremental, content-deduplicating zip archiver.
//!
//! Every run of a job writes `<work>/<job>.zip` holding only the files whose
//! content has never been archived by that job before, plus a `snapshot.json`
//! manifest mapping every current file to its MD5 fingerprint. The set of
//! fingerprints already archived lives in `<work>/<job>.history`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nova_archiver::{ArchiveEngine, JobConfig};
//! use std::path::Path;
//!
//! # fn main() -> nova_archiver::Result<()> {
//! let config = JobConfig::new("documents", Path::new("./my-data"), Path::new("./backups"))
//!     .with_exclude(r".*\.tmp");
//! let report = ArchiveEngine::new(config).run()?;
//! println!("{} new files in {}", report.new_files, report.archive.display());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod history;
pub mod lock;
pub mod logging;
pub mod snapshot;

// Re-export commonly used types
pub use config::{ExcludeFilter, JobConfig};
pub use engine::{ArchiveEngine, RunReport};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use history::HistoryStore;
pub use snapshot::{Snapshot, SnapshotEntry};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
