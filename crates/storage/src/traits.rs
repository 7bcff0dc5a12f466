//! Storage traits/interfaces for object-storage operations.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{CompletedPart, ObjectMetadata};

/// Low-level object-storage operations - implemented by each backend.
///
/// All methods may fail with transient or permanent [`StorageError`]s;
/// callers classify via [`StorageError::is_retryable`]. Implementations
/// must be safe to call concurrently from multiple workers.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Check if an object exists and return its size in bytes.
    /// Returns None if the object doesn't exist.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<u64>, StorageError>;

    /// Fetch the byte range `[start, end_exclusive)` of an object.
    ///
    /// A zero-length range (`start == end_exclusive`) returns an empty
    /// buffer without contacting the object body.
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end_exclusive: u64,
    ) -> Result<Vec<u8>, StorageError>;

    /// Upload bytes as a single object, returning the object's ETag.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: Option<&ObjectMetadata>,
    ) -> Result<String, StorageError>;

    /// Start a multipart upload session, returning its opaque id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        metadata: Option<&ObjectMetadata>,
    ) -> Result<String, StorageError>;

    /// Upload one part of a multipart session, returning its ETag.
    ///
    /// Part numbers are 1-based. Re-uploading a part number replaces the
    /// previous bytes for that number within the session.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: &[u8],
    ) -> Result<String, StorageError>;

    /// Complete a multipart session, assembling `parts` in the given order.
    ///
    /// Callers must pass parts in ascending part-number order.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError>;

    /// Abort a multipart session, discarding all uploaded parts.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError>;

    /// Delete an object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}
