//! Chunked archive pipeline.
//!
//! Compresses one large object from an object-storage bucket into a
//! gzip archive in the same storage system, without ever holding the
//! whole object in memory. The object is split into bounded byte ranges,
//! each range is fetched, compressed, and uploaded independently as one
//! part of a multipart upload session (with per-chunk retry and
//! backoff), and the parts are completed into one valid archive in
//! chunk-index order - or the session is aborted and nothing appears at
//! the destination key.
//!
//! The three moving pieces:
//!
//! - **Planner** (`planner`) - pure range math: ordered, non-overlapping
//!   chunks covering the object.
//! - **Worker** (`worker`) - fetch/compress/upload for one chunk, retried
//!   with exponential backoff on transient failures.
//! - **Session** (`session`) - the multipart upload lifecycle: concurrent
//!   completion recording, all-or-nothing commit, abort-on-failure.
//!
//! [`Archiver`] ties them together for one run per source object.

mod archive;
mod backoff;
mod config;
mod error;
mod planner;
mod run;
mod session;
mod task;
mod types;
mod worker;

pub use archive::{compress_chunk, destination_key, entry_name, ARCHIVE_CONTENT_TYPE};
pub use backoff::backoff_delay;
pub use config::{
    ArchiverConfig, RetrySettings, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FAN_OUT,
    DEFAULT_OUTPUT_PREFIX, DEFAULT_SMALL_OBJECT_THRESHOLD,
};
pub use error::ArchiveError;
pub use planner::{expected_chunk_count, plan_chunks, ChunkDescriptor};
pub use run::Archiver;
pub use session::{SessionOutcome, UploadSession};
pub use task::{ChunkState, ChunkTask};
pub use types::{ArchiveLocation, ArchiveOutcome, SourceObject};
pub use worker::{ChunkFailure, ChunkSink, ChunkWorker};
