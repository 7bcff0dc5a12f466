//! Error types for the archive pipeline.

use std::time::Duration;

use thiserror::Error;

use bucket_archiver_storage::StorageError;

/// Errors that can occur while archiving an object.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Invalid configuration; surfaced before any I/O happens.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Compressing a chunk's bytes failed.
    #[error("Compression failed for chunk {index}: {message}")]
    Compression { index: u32, message: String },

    /// One attempt on a chunk exceeded the per-chunk timeout.
    #[error("Chunk {index} attempt timed out after {timeout:?}")]
    AttemptTimeout { index: u32, timeout: Duration },

    /// A chunk permanently failed, either by exhausting its retry budget
    /// or by hitting a non-retryable error.
    #[error("Chunk {index} failed after {attempts} attempt(s): {source}")]
    ChunkFailed {
        index: u32,
        attempts: u32,
        #[source]
        source: Box<ArchiveError>,
    },

    /// The upload session was driven into an inconsistent state.
    #[error("Session integrity violation: {message}")]
    SessionIntegrity { message: String },

    /// The whole run exceeded its time budget; the session was aborted.
    #[error("Run timed out after {timeout:?}")]
    RunTimeout { timeout: Duration },
}

impl ArchiveError {
    /// Whether one more attempt on the same chunk could succeed.
    ///
    /// Storage errors defer to [`StorageError::is_retryable`]; attempt
    /// timeouts are transient by definition. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ArchiveError::Storage(err) => err.is_retryable(),
            ArchiveError::AttemptTimeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_storage_error_is_transient() {
        let err = ArchiveError::Storage(StorageError::Throttled {
            message: "slow down".to_string(),
        });
        assert!(err.is_transient());
    }

    #[test]
    fn test_attempt_timeout_is_transient() {
        let err = ArchiveError::AttemptTimeout {
            index: 2,
            timeout: Duration::from_secs(30),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_permanent_errors_are_not_transient() {
        let not_found = ArchiveError::Storage(StorageError::NotFound {
            bucket: "b".to_string(),
            key: "k".to_string(),
        });
        let compression = ArchiveError::Compression {
            index: 0,
            message: "truncated input".to_string(),
        };
        assert!(!not_found.is_transient());
        assert!(!compression.is_transient());
    }
}
