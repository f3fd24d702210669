//! Durable storage backends for the long-term log

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::LongTermLog;

/// Failure reading or writing the durable document
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backing store does not exist yet
    #[error("memory document not found")]
    NotFound,

    /// Backing store exists but could not be read
    #[error("failed to read memory document: {0}")]
    Read(#[source] io::Error),

    /// Backing store contents are not a valid document
    #[error("failed to parse memory document: {0}")]
    Parse(#[source] serde_json::Error),

    /// Document could not be written
    #[error("failed to write memory document: {0}")]
    Write(String),
}

/// Where the long-term log lives between process runs
pub trait DurableStorage: Send + Sync {
    /// Read the whole document
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing has been stored yet, `Read`/`Parse` otherwise
    fn read(&self) -> Result<LongTermLog, StorageError>;

    /// Replace the whole document
    ///
    /// # Errors
    ///
    /// Returns `Write` if the document could not be stored
    fn write(&self, log: &LongTermLog) -> Result<(), StorageError>;
}

/// Stores the log as a pretty-printed JSON file
///
/// Writes go to a temporary sibling that is renamed over the target, so a
/// crash mid-write leaves the previous document intact. Parent directories
/// are not created.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DurableStorage for JsonFileStorage {
    fn read(&self) -> Result<LongTermLog, StorageError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound
            } else {
                StorageError::Read(e)
            }
        })?;

        serde_json::from_str(&content).map_err(StorageError::Parse)
    }

    fn write(&self, log: &LongTermLog) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(log, &mut serializer)
            .map_err(|e| StorageError::Write(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| StorageError::Write(format!("{}: {e}", dir.display())))?;
        tmp.write_all(&buf)
            .and_then(|()| tmp.flush())
            .map_err(|e| StorageError::Write(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::Write(e.error.to_string()))?;

        Ok(())
    }
}
