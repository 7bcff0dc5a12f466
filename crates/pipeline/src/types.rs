//! Core data types for the archive pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The object being archived. Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    /// Bucket holding the object.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Content length in bytes.
    pub size: u64,
}

/// Where an archive lives (or will live) in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLocation {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Terminal outcome of one archiver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The archive was committed.
    Archived {
        location: ArchiveLocation,
        /// Number of parts (chunks) in the archive.
        parts: u32,
        /// Size of the source object in bytes.
        original_size: u64,
    },
    /// The key is already under the output prefix; nothing was done.
    Skipped { key: String },
}
