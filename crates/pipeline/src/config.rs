//! Pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

/// Default chunk size (64 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Default threshold below which an object is archived in a single pass
/// (32 MiB).
pub const DEFAULT_SMALL_OBJECT_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Default concurrent chunk workers.
pub const DEFAULT_MAX_FAN_OUT: usize = 8;

/// Default per-chunk attempt timeout.
pub const DEFAULT_CHUNK_TIMEOUT_MS: u64 = 120_000;

/// Default run-level timeout.
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 900_000;

/// Prefix under which archives are written; keys already under it are
/// never reprocessed.
pub const DEFAULT_OUTPUT_PREFIX: &str = "processed/";

/// Retry settings for per-chunk storage operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum number of attempts per chunk (first try included).
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Backoff multiplier (exponential backoff).
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Configuration for one archiver run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Size of each planned byte range.
    pub chunk_size_bytes: u64,
    /// Objects at or below this size take the single-pass path;
    /// effectively clamped to `chunk_size_bytes`, so the single-pass
    /// path always carries a one-chunk plan.
    pub small_object_threshold_bytes: u64,
    /// Per-chunk retry settings.
    pub retry: RetrySettings,
    /// Maximum concurrent chunk workers.
    pub max_fan_out: usize,
    /// Timeout for one fetch/compress/upload attempt, in milliseconds.
    pub chunk_timeout_ms: u64,
    /// Timeout for the whole run, in milliseconds; None disables it.
    pub run_timeout_ms: Option<u64>,
    /// Output namespace for archives.
    pub output_prefix: String,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            small_object_threshold_bytes: DEFAULT_SMALL_OBJECT_THRESHOLD,
            retry: RetrySettings::default(),
            max_fan_out: DEFAULT_MAX_FAN_OUT,
            chunk_timeout_ms: DEFAULT_CHUNK_TIMEOUT_MS,
            run_timeout_ms: Some(DEFAULT_RUN_TIMEOUT_MS),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

impl ArchiverConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size_bytes: u64) -> Self {
        self.chunk_size_bytes = chunk_size_bytes;
        self
    }

    /// Set the single-pass threshold in bytes.
    pub fn with_small_object_threshold(mut self, threshold_bytes: u64) -> Self {
        self.small_object_threshold_bytes = threshold_bytes;
        self
    }

    /// Set the retry settings.
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Set the maximum concurrent chunk workers.
    pub fn with_max_fan_out(mut self, max_fan_out: usize) -> Self {
        self.max_fan_out = max_fan_out;
        self
    }

    /// Set the output namespace for archives.
    pub fn with_output_prefix(mut self, output_prefix: impl Into<String>) -> Self {
        self.output_prefix = output_prefix.into();
        self
    }

    /// Fail fast on settings that would make the run meaningless.
    ///
    /// Called before any I/O; every zero-valued knob here would otherwise
    /// surface later as a confusing mid-run failure.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.chunk_size_bytes == 0 {
            return Err(ArchiveError::InvalidConfig {
                message: "chunk_size_bytes must be positive".to_string(),
            });
        }
        if self.small_object_threshold_bytes == 0 {
            return Err(ArchiveError::InvalidConfig {
                message: "small_object_threshold_bytes must be positive".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ArchiveError::InvalidConfig {
                message: "retry.max_attempts must be positive".to_string(),
            });
        }
        if self.max_fan_out == 0 {
            return Err(ArchiveError::InvalidConfig {
                message: "max_fan_out must be positive".to_string(),
            });
        }
        if self.chunk_timeout_ms == 0 {
            return Err(ArchiveError::InvalidConfig {
                message: "chunk_timeout_ms must be positive".to_string(),
            });
        }
        if self.output_prefix.is_empty() {
            return Err(ArchiveError::InvalidConfig {
                message: "output_prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The single-pass threshold, clamped to the chunk size.
    pub fn effective_small_object_threshold(&self) -> u64 {
        self.small_object_threshold_bytes.min(self.chunk_size_bytes)
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    /// Run-level timeout as a [`Duration`], if enabled.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }
}
