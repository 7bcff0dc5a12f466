//! In-memory storage backend with fault injection.
//!
//! Implements [`StorageClient`] against process-local maps, including the
//! full multipart session lifecycle. Intended for unit and integration
//! tests: faults and delays can be scripted per operation to exercise
//! retry, timeout, and abort paths, and helpers expose stored objects and
//! open sessions so tests can assert on residual state.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::traits::StorageClient;
use crate::types::{CompletedPart, ObjectMetadata};

/// Storage operations that can have faults injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Head,
    RangeGet,
    Put,
    CreateMultipart,
    UploadPart,
    CompleteMultipart,
    AbortMultipart,
    Delete,
}

/// A stored object: bytes plus the attributes set at write time.
#[derive(Debug, Clone, Default)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub metadata: ObjectMetadata,
}

/// An open multipart session accumulating parts.
#[derive(Debug, Clone)]
struct MultipartSession {
    bucket: String,
    key: String,
    content_type: Option<String>,
    metadata: ObjectMetadata,
    /// Part number -> (bytes, etag). Re-upload replaces the entry.
    parts: HashMap<i32, (Vec<u8>, String)>,
}

/// In-memory [`StorageClient`] implementation.
#[derive(Default)]
pub struct MemoryStorageClient {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    sessions: Mutex<HashMap<String, MultipartSession>>,
    next_upload_id: AtomicU64,
    faults: Mutex<HashMap<StorageOp, FaultPlan>>,
    delays: Mutex<HashMap<StorageOp, VecDeque<Duration>>>,
    calls: Mutex<HashMap<StorageOp, u64>>,
}

/// Scripted faults for one operation.
#[derive(Debug, Default)]
struct FaultPlan {
    /// Consumed FIFO, one per call, regardless of arguments.
    queue: VecDeque<StorageError>,
    /// Triggered when the operation's 1-based call counter hits the key.
    at_call: HashMap<u64, StorageError>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object into the store.
    pub fn insert_object(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects.write().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: None,
                metadata: ObjectMetadata::new(),
            },
        );
    }

    /// Fetch a stored object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of multipart sessions still open (neither completed nor
    /// aborted). Zero after a clean run, committed or not.
    pub fn open_session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Total parts held by open sessions. Zero means no residual data.
    pub fn residual_part_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .map(|s| s.parts.len())
            .sum()
    }

    /// Queue an error to be returned by the next call to `op`.
    ///
    /// Faults for the same operation are consumed in FIFO order, one per
    /// call; once the queue drains the operation succeeds normally.
    pub fn inject_fault(&self, op: StorageOp, error: StorageError) {
        self.faults
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .queue
            .push_back(error);
    }

    /// Queue the same error `times` times for `op`.
    pub fn inject_faults(&self, op: StorageOp, error: StorageError, times: usize) {
        for _ in 0..times {
            self.inject_fault(op, error.clone());
        }
    }

    /// Fail the `nth_call`-th invocation (1-based) of `op`.
    ///
    /// Lets a test target one chunk's attempts when several chunks hit the
    /// same operation, e.g. with a fan-out of 1 the second range read is
    /// the first attempt of chunk index 1.
    pub fn inject_fault_at_call(&self, op: StorageOp, nth_call: u64, error: StorageError) {
        self.faults
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .at_call
            .insert(nth_call, error);
    }

    /// Delay the next call to `op`, simulating a slow backend.
    ///
    /// Delays for the same operation are consumed in FIFO order, one per
    /// call, before any scripted fault for that call is considered.
    pub fn inject_delay(&self, op: StorageOp, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(delay);
    }

    /// Number of times `op` has been invoked (faulted calls included).
    pub fn call_count(&self, op: StorageOp) -> u64 {
        *self.calls.lock().unwrap().get(&op).unwrap_or(&0)
    }

    /// Record the call, apply a scripted delay, and pop a scripted fault
    /// for it, if any.
    async fn begin_call(&self, op: StorageOp) -> Result<(), StorageError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(op).or_insert(0);
            *count += 1;
            *count
        };
        let delay = {
            let mut delays = self.delays.lock().unwrap();
            delays.get_mut(&op).and_then(|queue| queue.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fault = {
            let mut faults = self.faults.lock().unwrap();
            faults.get_mut(&op).and_then(|plan| {
                plan.at_call
                    .remove(&call_number)
                    .or_else(|| plan.queue.pop_front())
            })
        };
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn etag_for(data: &[u8]) -> String {
        format!("\"{:x}\"", md5::compute(data))
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<u64>, StorageError> {
        self.begin_call(StorageOp::Head).await?;
        Ok(self
            .objects
            .read()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.len() as u64))
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end_exclusive: u64,
    ) -> Result<Vec<u8>, StorageError> {
        self.begin_call(StorageOp::RangeGet).await?;
        let objects = self.objects.read().unwrap();
        let object = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        let len = object.data.len() as u64;
        if start > end_exclusive || end_exclusive > len {
            return Err(StorageError::Other {
                message: format!(
                    "Invalid range [{start}, {end_exclusive}) for object of {len} bytes"
                ),
            });
        }
        Ok(object.data[start as usize..end_exclusive as usize].to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: Option<&ObjectMetadata>,
    ) -> Result<String, StorageError> {
        self.begin_call(StorageOp::Put).await?;
        let etag = Self::etag_for(data);
        self.objects.write().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.map(str::to_string),
                metadata: metadata.cloned().unwrap_or_default(),
            },
        );
        Ok(etag)
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        metadata: Option<&ObjectMetadata>,
    ) -> Result<String, StorageError> {
        self.begin_call(StorageOp::CreateMultipart).await?;
        let upload_id = format!(
            "upload-{}",
            self.next_upload_id.fetch_add(1, Ordering::Relaxed)
        );
        self.sessions.lock().unwrap().insert(
            upload_id.clone(),
            MultipartSession {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                metadata: metadata.cloned().unwrap_or_default(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        data: &[u8],
    ) -> Result<String, StorageError> {
        self.begin_call(StorageOp::UploadPart).await?;
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::ServiceError {
                message: format!("No such upload: {upload_id}"),
                retryable: false,
            })?;
        let etag = Self::etag_for(data);
        session.parts.insert(part_number, (data.to_vec(), etag.clone()));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        self.begin_call(StorageOp::CompleteMultipart).await?;
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .remove(upload_id)
            .ok_or_else(|| StorageError::ServiceError {
                message: format!("No such upload: {upload_id}"),
                retryable: false,
            })?;
        let mut data = Vec::new();
        for part in parts {
            let (bytes, etag) = session.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::Other {
                    message: format!("Part {} was never uploaded", part.part_number),
                }
            })?;
            if *etag != part.etag {
                return Err(StorageError::Other {
                    message: format!("ETag mismatch for part {}", part.part_number),
                });
            }
            data.extend_from_slice(bytes);
        }
        self.objects.write().unwrap().insert(
            (session.bucket, session.key),
            StoredObject {
                data,
                content_type: session.content_type,
                metadata: session.metadata,
            },
        );
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.begin_call(StorageOp::AbortMultipart).await?;
        self.sessions.lock().unwrap().remove(upload_id);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.begin_call(StorageOp::Delete).await?;
        self.objects
            .write()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_head_and_range_get() {
        let client = MemoryStorageClient::new();
        client.insert_object("b", "k", vec![1, 2, 3, 4, 5]);

        assert_eq!(client.head_object("b", "k").await.unwrap(), Some(5));
        assert_eq!(client.head_object("b", "missing").await.unwrap(), None);

        let bytes = client.get_object_range("b", "k", 1, 4).await.unwrap();
        assert_eq!(bytes, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_range_get_rejects_out_of_bounds() {
        let client = MemoryStorageClient::new();
        client.insert_object("b", "k", vec![0; 10]);

        let err = client.get_object_range("b", "k", 5, 11).await.unwrap_err();
        assert!(matches!(err, StorageError::Other { .. }));
    }

    #[tokio::test]
    async fn test_multipart_completes_in_given_order() {
        let client = MemoryStorageClient::new();
        let upload_id = client
            .create_multipart_upload("b", "k", None, None)
            .await
            .unwrap();

        // Upload out of order; completion order is what matters.
        let tag2 = client
            .upload_part("b", "k", &upload_id, 2, b"world")
            .await
            .unwrap();
        let tag1 = client
            .upload_part("b", "k", &upload_id, 1, b"hello ")
            .await
            .unwrap();

        client
            .complete_multipart_upload(
                "b",
                "k",
                &upload_id,
                &[CompletedPart::new(1, tag1), CompletedPart::new(2, tag2)],
            )
            .await
            .unwrap();

        assert_eq!(client.object("b", "k").unwrap().data, b"hello world");
        assert_eq!(client.open_session_count(), 0);
    }

    #[tokio::test]
    async fn test_abort_discards_parts() {
        let client = MemoryStorageClient::new();
        let upload_id = client
            .create_multipart_upload("b", "k", None, None)
            .await
            .unwrap();
        client
            .upload_part("b", "k", &upload_id, 1, b"data")
            .await
            .unwrap();
        assert_eq!(client.residual_part_count(), 1);

        client
            .abort_multipart_upload("b", "k", &upload_id)
            .await
            .unwrap();
        assert_eq!(client.open_session_count(), 0);
        assert_eq!(client.residual_part_count(), 0);
        assert!(client.object("b", "k").is_none());
    }

    #[tokio::test]
    async fn test_reuploaded_part_replaces_bytes() {
        let client = MemoryStorageClient::new();
        let upload_id = client
            .create_multipart_upload("b", "k", None, None)
            .await
            .unwrap();
        client
            .upload_part("b", "k", &upload_id, 1, b"first")
            .await
            .unwrap();
        let tag = client
            .upload_part("b", "k", &upload_id, 1, b"second")
            .await
            .unwrap();

        client
            .complete_multipart_upload("b", "k", &upload_id, &[CompletedPart::new(1, tag)])
            .await
            .unwrap();
        assert_eq!(client.object("b", "k").unwrap().data, b"second");
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let client = MemoryStorageClient::new();
        client.insert_object("b", "k", vec![1, 2, 3]);

        client.delete_object("b", "k").await.unwrap();
        assert!(client.object("b", "k").is_none());
        assert_eq!(client.head_object("b", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fault_injection_fifo() {
        let client = MemoryStorageClient::new();
        client.insert_object("b", "k", vec![0; 4]);
        client.inject_faults(
            StorageOp::RangeGet,
            StorageError::Throttled {
                message: "busy".to_string(),
            },
            2,
        );

        assert!(client.get_object_range("b", "k", 0, 4).await.is_err());
        assert!(client.get_object_range("b", "k", 0, 4).await.is_err());
        assert!(client.get_object_range("b", "k", 0, 4).await.is_ok());
        assert_eq!(client.call_count(StorageOp::RangeGet), 3);
    }
}
