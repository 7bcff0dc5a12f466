//! Storage abstraction for the bucket-archiver pipeline.
//!
//! This crate provides a backend-agnostic interface for the object-storage
//! operations the archive pipeline needs: metadata lookup, range reads,
//! single-object writes, and the multipart upload session family
//! (create / upload part / complete / abort).
//!
//! Two implementations exist:
//!
//! - **S3 backend** (`bucket-archiver-storage-s3`) - AWS SDK for Rust
//! - **Memory backend** (`memory` module) - in-memory store with fault
//!   injection, used by the pipeline's unit and integration tests

mod error;
pub mod memory;
mod traits;
mod types;

pub use error::StorageError;
pub use memory::MemoryStorageClient;
pub use traits::StorageClient;
pub use types::{CompletedPart, ObjectMetadata};
