//! Multipart upload session lifecycle.
//!
//! The session object is the only permitted access path to the shared
//! completion map and failure flag, so the atomic-upsert and
//! abort-on-failure contract holds regardless of how many workers report
//! concurrently. Finalize and abort consume the session, so a terminated
//! session cannot be touched again by construction.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bucket_archiver_storage::{CompletedPart, ObjectMetadata, StorageClient};

use crate::error::ArchiveError;
use crate::types::ArchiveLocation;
use crate::worker::ChunkFailure;

/// Terminal outcome of a finalized session.
#[derive(Debug)]
pub enum SessionOutcome {
    /// All parts were recorded; the archive is live at `location`.
    Committed { location: ArchiveLocation },
    /// The session was aborted; all uploaded parts were discarded.
    Aborted { failure: Option<ChunkFailure> },
}

/// State guarded by the session lock.
#[derive(Debug, Default)]
struct SessionInner {
    /// Part number -> completion token. BTreeMap keeps commit order
    /// ascending by construction.
    parts: BTreeMap<i32, String>,
    /// First recorded chunk failure; later ones only reinforce the doom.
    first_failure: Option<ChunkFailure>,
}

/// One multipart upload session, from open to commit or abort.
///
/// Created before any worker starts; workers report through
/// [`record_completion`](Self::record_completion) and
/// [`record_failure`](Self::record_failure); exactly one of
/// [`finalize`](Self::finalize) or [`abort`](Self::abort) terminates it.
pub struct UploadSession {
    upload_id: String,
    location: ArchiveLocation,
    total_parts: u32,
    inner: Mutex<SessionInner>,
    doomed: AtomicBool,
}

impl UploadSession {
    /// Open a new multipart session at `location`.
    ///
    /// Must succeed before any worker runs; a failure here is fatal to
    /// the run and leaves nothing to clean up.
    pub async fn open(
        client: &dyn StorageClient,
        location: ArchiveLocation,
        total_parts: u32,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<Self, ArchiveError> {
        let upload_id = client
            .create_multipart_upload(
                &location.bucket,
                &location.key,
                Some(content_type),
                Some(metadata),
            )
            .await?;

        Ok(Self {
            upload_id,
            location,
            total_parts,
            inner: Mutex::new(SessionInner::default()),
            doomed: AtomicBool::new(false),
        })
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn location(&self) -> &ArchiveLocation {
        &self.location
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    /// True once any failure has been recorded. Monotonic.
    pub fn is_doomed(&self) -> bool {
        self.doomed.load(Ordering::SeqCst)
    }

    /// Record a successful part upload.
    ///
    /// Idempotent upsert: recording the same part number again replaces
    /// the stored token with the latest one, so re-delivered completion
    /// notifications are harmless. An out-of-range part number is a
    /// session integrity violation.
    pub fn record_completion(&self, part: CompletedPart) -> Result<(), ArchiveError> {
        if part.part_number < 1 || part.part_number as u32 > self.total_parts {
            return Err(ArchiveError::SessionIntegrity {
                message: format!(
                    "part number {} outside expected range 1..={}",
                    part.part_number, self.total_parts
                ),
            });
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = inner.parts.insert(part.part_number, part.etag) {
            log::debug!(
                "Part {} re-recorded for {}; replaced token {}",
                part.part_number,
                self.location,
                previous
            );
        }
        Ok(())
    }

    /// Record a permanent chunk failure, dooming the session.
    ///
    /// Does not abort anything yet: in-flight chunks may finish
    /// naturally, but commit is blocked and finalize will abort.
    pub fn record_failure(&self, failure: ChunkFailure) {
        log::warn!(
            "Chunk {} failed after {} attempt(s) for {}: {}",
            failure.index,
            failure.attempts,
            self.location,
            failure.error
        );
        self.doomed.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.first_failure.get_or_insert(failure);
    }

    /// Snapshot of the recorded parts, in ascending part-number order.
    pub fn completed_parts(&self) -> Vec<CompletedPart> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .parts
            .iter()
            .map(|(n, etag)| CompletedPart::new(*n, etag.clone()))
            .collect()
    }

    /// Terminate the session: commit if every part is accounted for and
    /// no failure was recorded, abort otherwise.
    ///
    /// Parts are assembled strictly in ascending part-number order,
    /// independent of completion order. Missing parts without a recorded
    /// failure are a session integrity violation; the session is still
    /// aborted before the error surfaces. If the commit call itself fails
    /// the abort is attempted too, and the commit error surfaces.
    pub async fn finalize(self, client: &dyn StorageClient) -> Result<SessionOutcome, ArchiveError> {
        let doomed = self.is_doomed();
        let UploadSession {
            upload_id,
            location,
            total_parts,
            inner,
            ..
        } = self;
        let inner = inner.into_inner().unwrap_or_else(|e| e.into_inner());

        if doomed {
            abort_quietly(client, &location, &upload_id).await;
            return Ok(SessionOutcome::Aborted {
                failure: inner.first_failure,
            });
        }

        let recorded = inner.parts.len() as u32;
        if recorded != total_parts {
            abort_quietly(client, &location, &upload_id).await;
            return Err(ArchiveError::SessionIntegrity {
                message: format!(
                    "finalize with {recorded} of {total_parts} parts recorded for {location}"
                ),
            });
        }

        let parts: Vec<CompletedPart> = inner
            .parts
            .into_iter()
            .map(|(n, etag)| CompletedPart::new(n, etag))
            .collect();

        if let Err(err) = client
            .complete_multipart_upload(&location.bucket, &location.key, &upload_id, &parts)
            .await
        {
            abort_quietly(client, &location, &upload_id).await;
            return Err(err.into());
        }

        Ok(SessionOutcome::Committed { location })
    }

    /// Abort the session outright, discarding all uploaded parts.
    ///
    /// For failure paths outside the chunk outcome protocol, e.g. a
    /// run-level timeout. The abort error, if any, is returned so the
    /// caller can log it without masking the original failure.
    pub async fn abort(self, client: &dyn StorageClient) -> Result<(), ArchiveError> {
        client
            .abort_multipart_upload(&self.location.bucket, &self.location.key, &self.upload_id)
            .await?;
        Ok(())
    }
}

/// Abort without letting an abort failure mask the caller's error.
async fn abort_quietly(client: &dyn StorageClient, location: &ArchiveLocation, upload_id: &str) {
    if let Err(err) = client
        .abort_multipart_upload(&location.bucket, &location.key, upload_id)
        .await
    {
        log::warn!("Failed to abort upload session for {location}: {err}");
    }
}
