//! Shared types for storage operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// User metadata attached to a stored object.
///
/// Keys are lowercase metadata names (e.g. `original-file`); the storage
/// backend is responsible for any header prefixing its protocol requires.
pub type ObjectMetadata = HashMap<String, String>;

/// A successfully uploaded part of a multipart session.
///
/// Pairs the 1-based part number with the opaque completion token (ETag)
/// the storage service returned for it. The full ordered list is required
/// to complete the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// 1-based part number within the session.
    pub part_number: i32,
    /// Opaque completion token returned by the part upload.
    pub etag: String,
}

impl CompletedPart {
    /// Create a completed part record.
    pub fn new(part_number: i32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}
