//! Content fingerprints used as the deduplication key.
//!
//! A fingerprint is the MD5 digest of a file's full byte content, rendered as
//! 32 lowercase hex characters. Size, mtime and path play no part in it.

use crate::{Error, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Read buffer size used while hashing (64 KiB)
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Length of a fingerprint in hex characters
pub const FINGERPRINT_HEX_LEN: usize = 32;

/// A 128-bit content fingerprint, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a hex fingerprint, accepting either case
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let valid = value.len() == FINGERPRINT_HEX_LEN
            && hex::decode(value).map(|b| b.len() == 16).unwrap_or(false);
        if !valid {
            return Err(Error::InvalidFingerprint {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Fingerprint an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_digest(Md5::digest(data).as_slice())
    }

    fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Get the hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

/// Compute the fingerprint of a stream, reading it in bounded chunks
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint::from_digest(hasher.finalize().as_slice()))
}

/// Compute the fingerprint of a file in streaming fashion
pub fn hash_file<P: AsRef<Path>>(path: P) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    hash_reader(file)
}

/// Reader adapter that fingerprints every byte passed through it
pub struct HashingReader<R> {
    inner: R,
    hasher: Md5,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Md5::new(),
        }
    }

    /// Fingerprint of the bytes read so far
    pub fn finish(self) -> Fingerprint {
        Fingerprint::from_digest(self.hasher.finalize().as_slice())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
