//! Run orchestration: plan, fan out, finalize.

use chrono::Utc;
use futures::stream::{self, StreamExt};

use bucket_archiver_storage::{ObjectMetadata, StorageClient, StorageError};

use crate::archive::{destination_key, ARCHIVE_CONTENT_TYPE};
use crate::config::ArchiverConfig;
use crate::error::ArchiveError;
use crate::planner::plan_chunks;
use crate::session::{SessionOutcome, UploadSession};
use crate::types::{ArchiveLocation, ArchiveOutcome, SourceObject};
use crate::worker::{ChunkFailure, ChunkSink, ChunkWorker};

/// Archives one source object per call, against any storage backend.
pub struct Archiver<'a, C: StorageClient> {
    /// The storage client for all reads and writes.
    client: &'a C,
    /// Run configuration.
    config: ArchiverConfig,
}

impl<'a, C: StorageClient> Archiver<'a, C> {
    /// Create an archiver with the given configuration.
    pub fn new(client: &'a C, config: ArchiverConfig) -> Self {
        Self { client, config }
    }

    /// Create an archiver with default configuration.
    pub fn with_defaults(client: &'a C) -> Self {
        Self::new(client, ArchiverConfig::default())
    }

    /// Archive the object at `bucket`/`key`.
    ///
    /// Plans the object into chunks, processes each chunk (fetch,
    /// compress, upload) with bounded fan-out, and terminates the upload
    /// session exactly once: the complete archive appears at the
    /// destination key, or nothing does. Keys already under the output
    /// prefix are skipped so the pipeline never reprocesses its own
    /// output.
    pub async fn archive_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        self.config.validate()?;

        if key.starts_with(&self.config.output_prefix) {
            log::debug!("Skipping {bucket}/{key}: already under the output prefix");
            return Ok(ArchiveOutcome::Skipped {
                key: key.to_string(),
            });
        }

        let size = self
            .client
            .head_object(bucket, key)
            .await?
            .ok_or_else(|| {
                ArchiveError::Storage(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            })?;

        let source = SourceObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
        };
        let plan = plan_chunks(size, self.config.chunk_size_bytes)?;
        let location = ArchiveLocation {
            bucket: bucket.to_string(),
            key: destination_key(&self.config.output_prefix, key),
        };
        let metadata = archive_metadata(&source);
        let worker = ChunkWorker::new(self.client, &source, &self.config);

        // Objects at or below the clamped small-object threshold skip the
        // multipart session and write the archive with one direct put;
        // the clamp guarantees a one-chunk plan here. Larger objects go
        // through a session even when the plan has a single chunk. Both
        // paths share the compress step, so one-chunk outputs are
        // byte-identical either way.
        if size <= self.config.effective_small_object_threshold() {
            debug_assert_eq!(plan.len(), 1);
            let sink = ChunkSink::Direct {
                location: &location,
                metadata: &metadata,
            };
            worker
                .process(&plan[0], &sink)
                .await
                .map_err(ChunkFailure::into_error)?;
            log::info!("Archived {bucket}/{key} -> {location} (single pass)");
            return Ok(ArchiveOutcome::Archived {
                location,
                parts: 1,
                original_size: size,
            });
        }

        let total_parts = plan.len() as u32;
        let session = UploadSession::open(
            self.client,
            location,
            total_parts,
            ARCHIVE_CONTENT_TYPE,
            &metadata,
        )
        .await?;

        let drive = stream::iter(plan.iter())
            .map(|descriptor| {
                let worker = &worker;
                let session = &session;
                async move {
                    if session.is_doomed() {
                        // Commit is already impossible; don't burn
                        // retries on chunks that cannot land.
                        log::debug!(
                            "Skipping chunk {}: session already doomed",
                            descriptor.index
                        );
                        return Ok(());
                    }
                    match worker.process(descriptor, &ChunkSink::Session(session)).await {
                        Ok(part) => session.record_completion(part),
                        Err(failure) => {
                            session.record_failure(failure);
                            Ok(())
                        }
                    }
                }
            })
            .buffer_unordered(self.config.max_fan_out)
            .collect::<Vec<Result<(), ArchiveError>>>();

        let results = match self.config.run_timeout() {
            Some(limit) => match tokio::time::timeout(limit, drive).await {
                Ok(results) => results,
                Err(_) => {
                    // The session must not outlive the run.
                    if let Err(abort_err) = session.abort(self.client).await {
                        log::warn!("Failed to abort session after run timeout: {abort_err}");
                    }
                    return Err(ArchiveError::RunTimeout { timeout: limit });
                }
            },
            None => drive.await,
        };

        if let Some(err) = results.into_iter().find_map(Result::err) {
            if let Err(abort_err) = session.abort(self.client).await {
                log::warn!("Failed to abort session: {abort_err}");
            }
            return Err(err);
        }

        match session.finalize(self.client).await? {
            SessionOutcome::Committed { location } => {
                log::info!("Archived {bucket}/{key} -> {location} ({total_parts} parts)");
                Ok(ArchiveOutcome::Archived {
                    location,
                    parts: total_parts,
                    original_size: size,
                })
            }
            SessionOutcome::Aborted { failure } => Err(match failure {
                Some(failure) => failure.into_error(),
                None => ArchiveError::SessionIntegrity {
                    message: "session aborted without a recorded failure".to_string(),
                },
            }),
        }
    }
}

/// Metadata attached to every produced archive.
fn archive_metadata(source: &SourceObject) -> ObjectMetadata {
    let mut metadata = ObjectMetadata::new();
    metadata.insert("original-file".to_string(), source.key.clone());
    metadata.insert("original-size".to_string(), source.size.to_string());
    metadata.insert("processed-date".to_string(), Utc::now().to_rfc3339());
    metadata
}
