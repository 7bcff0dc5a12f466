//! Chunk worker: fetch, compress, upload, with retry.

use bucket_archiver_storage::{CompletedPart, ObjectMetadata, StorageClient};

use crate::archive::{compress_chunk, ARCHIVE_CONTENT_TYPE};
use crate::backoff::backoff_delay;
use crate::config::ArchiverConfig;
use crate::error::ArchiveError;
use crate::planner::ChunkDescriptor;
use crate::session::UploadSession;
use crate::task::ChunkTask;
use crate::types::{ArchiveLocation, SourceObject};

/// A chunk that permanently failed: retry budget exhausted or a
/// non-retryable error.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Index of the failed chunk.
    pub index: u32,
    /// Attempts consumed before giving up.
    pub attempts: u32,
    /// The last error observed.
    pub error: ArchiveError,
}

impl ChunkFailure {
    /// Fold into the pipeline error type.
    pub fn into_error(self) -> ArchiveError {
        ArchiveError::ChunkFailed {
            index: self.index,
            attempts: self.attempts,
            source: Box::new(self.error),
        }
    }
}

/// Where a processed chunk's bytes go.
pub enum ChunkSink<'a> {
    /// Upload as part `index + 1` of a multipart session.
    Session(&'a UploadSession),
    /// Write directly as the whole archive object (single-pass path for
    /// one-chunk plans).
    Direct {
        location: &'a ArchiveLocation,
        metadata: &'a ObjectMetadata,
    },
}

/// Processes chunks of one source object.
///
/// Each call to [`process`](Self::process) is independent: workers for
/// distinct indices may run concurrently, and re-processing an index is
/// safe because part upload is a last-writer-wins upsert per part number.
pub struct ChunkWorker<'a, C: StorageClient> {
    client: &'a C,
    source: &'a SourceObject,
    config: &'a ArchiverConfig,
}

impl<'a, C: StorageClient> ChunkWorker<'a, C> {
    pub fn new(client: &'a C, source: &'a SourceObject, config: &'a ArchiverConfig) -> Self {
        Self {
            client,
            source,
            config,
        }
    }

    /// Process one chunk to a terminal outcome.
    ///
    /// Runs up to `retry.max_attempts` attempts. Each attempt fetches the
    /// chunk's byte range, compresses it into its archive entry, and
    /// uploads the result, bounded by the per-chunk timeout (an elapsed
    /// timeout counts as one transient failure). Transient errors back
    /// off exponentially between attempts; permanent errors fail the
    /// chunk immediately without consuming the remaining budget.
    pub async fn process(
        &self,
        descriptor: &ChunkDescriptor,
        sink: &ChunkSink<'_>,
    ) -> Result<CompletedPart, ChunkFailure> {
        let mut task = ChunkTask::new(descriptor.clone());
        loop {
            task.begin_attempt();
            let outcome = tokio::time::timeout(
                self.config.chunk_timeout(),
                self.attempt(&mut task, sink),
            )
            .await;

            let error = match outcome {
                Ok(Ok(part)) => {
                    task.complete();
                    return Ok(part);
                }
                Ok(Err(err)) => err,
                Err(_) => ArchiveError::AttemptTimeout {
                    index: descriptor.index,
                    timeout: self.config.chunk_timeout(),
                },
            };

            if error.is_transient() && task.attempts() < self.config.retry.max_attempts {
                log::warn!(
                    "Chunk {} attempt {} failed ({error}); retrying",
                    descriptor.index,
                    task.attempts()
                );
                task.begin_retry();
                tokio::time::sleep(backoff_delay(task.attempts(), &self.config.retry)).await;
                continue;
            }

            task.fail();
            return Err(ChunkFailure {
                index: descriptor.index,
                attempts: task.attempts(),
                error,
            });
        }
    }

    /// One fetch/compress/upload attempt.
    async fn attempt(
        &self,
        task: &mut ChunkTask,
        sink: &ChunkSink<'_>,
    ) -> Result<CompletedPart, ArchiveError> {
        let descriptor = task.descriptor().clone();

        let bytes = self
            .client
            .get_object_range(
                &self.source.bucket,
                &self.source.key,
                descriptor.start,
                descriptor.end,
            )
            .await?;

        task.begin_compress();
        let compressed = compress_chunk(descriptor.index, &bytes)?;

        task.begin_upload();
        let etag = match sink {
            ChunkSink::Session(session) => {
                let location = session.location();
                self.client
                    .upload_part(
                        &location.bucket,
                        &location.key,
                        session.upload_id(),
                        descriptor.part_number(),
                        &compressed,
                    )
                    .await?
            }
            ChunkSink::Direct { location, metadata } => {
                self.client
                    .put_object(
                        &location.bucket,
                        &location.key,
                        &compressed,
                        Some(ARCHIVE_CONTENT_TYPE),
                        Some(metadata),
                    )
                    .await?
            }
        };

        Ok(CompletedPart::new(descriptor.part_number(), etag))
    }
}

#[cfg(test)]
mod tests {
    use bucket_archiver_storage::memory::StorageOp;
    use bucket_archiver_storage::{MemoryStorageClient, StorageError};

    use crate::config::RetrySettings;

    use super::*;

    fn test_config() -> ArchiverConfig {
        let mut config = ArchiverConfig::default();
        config.retry = RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
        };
        config
    }

    fn source(client: &MemoryStorageClient, data: Vec<u8>) -> SourceObject {
        client.insert_object("bucket", "uploads/data.bin", data);
        SourceObject {
            bucket: "bucket".to_string(),
            key: "uploads/data.bin".to_string(),
            size: 0, // unused by the worker
        }
    }

    fn throttled() -> StorageError {
        StorageError::Throttled {
            message: "slow down".to_string(),
        }
    }

    async fn open_session(client: &MemoryStorageClient, total_parts: u32) -> UploadSession {
        UploadSession::open(
            client,
            ArchiveLocation {
                bucket: "bucket".to_string(),
                key: "processed/uploads/data.bin.gz".to_string(),
            },
            total_parts,
            ARCHIVE_CONTENT_TYPE,
            &ObjectMetadata::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_errors_within_budget() {
        let client = MemoryStorageClient::new();
        let config = test_config();
        let source = source(&client, vec![7u8; 64]);
        let session = open_session(&client, 1).await;
        // max_attempts - 1 transient failures, then success.
        client.inject_faults(StorageOp::UploadPart, throttled(), 2);

        let worker = ChunkWorker::new(&client, &source, &config);
        let descriptor = ChunkDescriptor { index: 0, start: 0, end: 64 };
        let part = worker
            .process(&descriptor, &ChunkSink::Session(&session))
            .await
            .unwrap();

        assert_eq!(part.part_number, 1);
        assert_eq!(client.call_count(StorageOp::UploadPart), 3);
    }

    #[tokio::test]
    async fn test_exhausting_budget_fails_without_extra_attempts() {
        let client = MemoryStorageClient::new();
        let config = test_config();
        let source = source(&client, vec![7u8; 64]);
        let session = open_session(&client, 1).await;
        client.inject_faults(StorageOp::RangeGet, throttled(), 3);

        let worker = ChunkWorker::new(&client, &source, &config);
        let descriptor = ChunkDescriptor { index: 0, start: 0, end: 64 };
        let failure = worker
            .process(&descriptor, &ChunkSink::Session(&session))
            .await
            .unwrap_err();

        assert_eq!(failure.index, 0);
        assert_eq!(failure.attempts, 3);
        // The budget was consumed exactly, never exceeded.
        assert_eq!(client.call_count(StorageOp::RangeGet), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_on_first_attempt() {
        let client = MemoryStorageClient::new();
        let config = test_config();
        let source = source(&client, vec![7u8; 64]);
        let session = open_session(&client, 1).await;
        client.inject_fault(
            StorageOp::RangeGet,
            StorageError::AccessDenied {
                bucket: "bucket".to_string(),
                key: "uploads/data.bin".to_string(),
                message: "no credentials".to_string(),
            },
        );

        let worker = ChunkWorker::new(&client, &source, &config);
        let descriptor = ChunkDescriptor { index: 0, start: 0, end: 64 };
        let failure = worker
            .process(&descriptor, &ChunkSink::Session(&session))
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(client.call_count(StorageOp::RangeGet), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out_and_retries() {
        let client = MemoryStorageClient::new();
        let mut config = test_config();
        config.chunk_timeout_ms = 20;
        let source = source(&client, vec![7u8; 64]);
        let session = open_session(&client, 1).await;
        // First fetch stalls past the attempt timeout; the retry is fast.
        client.inject_delay(StorageOp::RangeGet, std::time::Duration::from_millis(500));

        let worker = ChunkWorker::new(&client, &source, &config);
        let descriptor = ChunkDescriptor { index: 0, start: 0, end: 64 };
        let part = worker
            .process(&descriptor, &ChunkSink::Session(&session))
            .await
            .unwrap();

        assert_eq!(part.part_number, 1);
        // The timed-out attempt consumed budget: the fetch ran twice.
        assert_eq!(client.call_count(StorageOp::RangeGet), 2);
    }

    #[tokio::test]
    async fn test_timeouts_exhaust_the_budget() {
        let client = MemoryStorageClient::new();
        let mut config = test_config();
        config.chunk_timeout_ms = 20;
        let source = source(&client, vec![7u8; 64]);
        let session = open_session(&client, 1).await;
        for _ in 0..3 {
            client.inject_delay(StorageOp::RangeGet, std::time::Duration::from_millis(500));
        }

        let worker = ChunkWorker::new(&client, &source, &config);
        let descriptor = ChunkDescriptor { index: 0, start: 0, end: 64 };
        let failure = worker
            .process(&descriptor, &ChunkSink::Session(&session))
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, ArchiveError::AttemptTimeout { index: 0, .. }));
        assert_eq!(client.call_count(StorageOp::RangeGet), 3);
    }

    #[tokio::test]
    async fn test_direct_sink_writes_whole_archive() {
        let client = MemoryStorageClient::new();
        let config = test_config();
        let source = source(&client, b"payload".to_vec());
        let location = ArchiveLocation {
            bucket: "bucket".to_string(),
            key: "processed/uploads/data.bin.gz".to_string(),
        };
        let mut metadata = ObjectMetadata::new();
        metadata.insert("original-file".to_string(), source.key.clone());

        let worker = ChunkWorker::new(&client, &source, &config);
        let descriptor = ChunkDescriptor { index: 0, start: 0, end: 7 };
        let sink = ChunkSink::Direct {
            location: &location,
            metadata: &metadata,
        };
        worker.process(&descriptor, &sink).await.unwrap();

        let object = client.object("bucket", "processed/uploads/data.bin.gz").unwrap();
        assert_eq!(object.content_type.as_deref(), Some(ARCHIVE_CONTENT_TYPE));
        assert_eq!(
            object.metadata.get("original-file").map(String::as_str),
            Some("uploads/data.bin")
        );
    }
}
