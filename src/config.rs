//! Job configuration.
//!
//! A job is a named, repeatable backup: a source directory, an exclusion
//! pattern and a work directory where its history and archive live. Jobs can
//! be described in a TOML file and overridden from the command line.

use crate::archive::Compression;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Archive compression settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default)]
    pub method: Compression,
    /// Deflate level, `None` for the library default
    #[serde(default)]
    pub level: Option<i64>,
}

/// Configuration of a single archive job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job_name: String,
    pub source_dir: PathBuf,
    pub work_dir: PathBuf,
    /// Regex matched against whole file names; matching files are skipped
    #[serde(default)]
    pub exclude: Option<String>,
    #[serde(default)]
    pub compression: CompressionConfig,
}

impl JobConfig {
    pub fn new(job_name: &str, source_dir: &Path, work_dir: &Path) -> Self {
        Self {
            job_name: job_name.to_string(),
            source_dir: source_dir.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            exclude: None,
            compression: CompressionConfig::default(),
        }
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.exclude = Some(pattern.to_string());
        self
    }

    pub fn with_compression(mut self, method: Compression, level: Option<i64>) -> Self {
        self.compression = CompressionConfig { method, level };
        self
    }

    /// Load a job description from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: JobConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check the job name, compile the exclusion pattern and make sure the
    /// work directory exists
    pub fn validate(&self) -> Result<ExcludeFilter> {
        validate_job_name(&self.job_name)?;

        if let Some(level) = self.compression.level {
            if !(0..=9).contains(&level) {
                return Err(Error::Configuration {
                    reason: format!("compression level {} is outside 0..=9", level),
                });
            }
        }

        fs::create_dir_all(&self.work_dir)?;

        match &self.exclude {
            Some(pattern) => ExcludeFilter::new(pattern),
            None => Ok(ExcludeFilter::none()),
        }
    }
}

fn validate_job_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);

    if invalid {
        return Err(Error::Configuration {
            reason: format!("invalid job name {:?}", name),
        });
    }
    Ok(())
}

/// Compiled exclusion pattern, matched against file names only
#[derive(Debug, Clone)]
pub struct ExcludeFilter {
    regex: Option<Regex>,
}

impl ExcludeFilter {
    /// Compile `pattern` so that it must match the entire file name
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self { regex: Some(regex) })
    }

    /// Filter that excludes nothing
    pub fn none() -> Self {
        Self { regex: None }
    }

    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.regex
            .as_ref()
            .map(|r| r.is_match(file_name))
            .unwrap_or(false)
    }

    pub fn pattern(&self) -> Option<&str> {
        self.regex.as_ref().map(|r| r.as_str())
    }
}
