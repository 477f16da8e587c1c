//! Error types for nova-archiver

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archiver operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid exclusion pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Source directory not found or unreadable: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Invalid fingerprint: {value}")]
    InvalidFingerprint { value: String },

    #[error("Corrupt history file {path} at line {line}: {reason}")]
    InvalidHistory {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid snapshot document: {reason}")]
    InvalidSnapshot { reason: String },

    #[error("Duplicate archive entry: {name}")]
    DuplicateEntry { name: String },

    #[error("Source file changed while being archived: {path}")]
    SourceChanged { path: PathBuf },

    #[error("Job {job} is locked by another run ({path})")]
    JobLocked { job: String, path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },
}

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, Error>;
