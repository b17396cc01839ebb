//! Process-local backend used for development and tests.
//!
//! Committed objects and open multipart sessions are kept apart: parts land
//! in their session and only become an object on completion, so an aborted
//! or abandoned session never produces a visible object. Part size rules
//! follow S3 (every part except the last must be at least
//! [`MIN_PART_SIZE`] bytes).
//!
//! With the `test-utils` feature the provider can inject failures into
//! individual calls and delay part uploads.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};

use crate::client::{GetOutput, ObjectBackend, PutOutput};
use crate::types::{CompletedPart, Error, MultipartId, ObjectHead, Result};

/// Minimum size of every part except the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

const ID: &str = "memory";

/// Lifecycle counters for multipart sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Sessions opened.
    pub created: usize,
    /// Sessions committed.
    pub completed: usize,
    /// Sessions aborted.
    pub aborted: usize,
}

#[derive(Debug, Default, Clone)]
struct Faults {
    head: bool,
    create: bool,
    part: Option<u32>,
    complete: bool,
    abort: bool,
    get: bool,
    part_delay: Option<Duration>,
}

#[derive(Debug)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    e_tag: String,
    part_sizes: Vec<usize>,
}

#[derive(Debug)]
struct Session {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<(String, String), StoredObject>,
    sessions: HashMap<MultipartId, Session>,
    stats: MemoryStats,
    faults: Faults,
}

/// In-memory [`ObjectBackend`].
///
/// Cloning yields another handle to the same store, so a test can keep one
/// handle for inspection while the storage layer owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    state: Arc<Mutex<State>>,
}

impl MemoryProvider {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn injected(call: &str) -> Error {
        Error::runtime(format!("injected failure: {call}"), ID, true)
    }

    /// Bytes of a committed object.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .map(|o| o.data.clone())
    }

    /// Whether a committed object exists.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.object(bucket, key).is_some()
    }

    /// Sizes of the parts a committed object was assembled from, in order.
    pub fn part_sizes(&self, bucket: &str, key: &str) -> Option<Vec<usize>> {
        self.lock()
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .map(|o| o.part_sizes.clone())
    }

    /// Number of committed objects across all buckets.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    /// Whether no object has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sessions neither completed nor aborted.
    pub fn open_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Session lifecycle counters.
    pub fn stats(&self) -> MemoryStats {
        self.lock().stats
    }
}

#[cfg(feature = "test-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
impl MemoryProvider {
    /// Make every existence check fail with a non-not-found error.
    pub fn fail_head(&self) {
        self.lock().faults.head = true;
    }

    /// Make opening a session fail.
    pub fn fail_create(&self) {
        self.lock().faults.create = true;
    }

    /// Make uploading `part_number` fail.
    pub fn fail_part(&self, part_number: u32) {
        self.lock().faults.part = Some(part_number);
    }

    /// Make completion fail.
    pub fn fail_complete(&self) {
        self.lock().faults.complete = true;
    }

    /// Make aborting a session fail. The session stays open.
    pub fn fail_abort(&self) {
        self.lock().faults.abort = true;
    }

    /// Make object retrieval fail with a non-not-found error.
    pub fn fail_get(&self) {
        self.lock().faults.get = true;
    }

    /// Sleep for `delay` before accepting each part.
    pub fn delay_parts(&self, delay: Duration) {
        self.lock().faults.part_delay = Some(delay);
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.lock().faults = Faults::default();
    }
}

fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[async_trait::async_trait]
impl ObjectBackend for MemoryProvider {
    fn id(&self) -> &'static str {
        ID
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let state = self.lock();
        if state.faults.head {
            return Err(Self::injected("head_object"));
        }
        state
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .map(|o| ObjectHead {
                size: o.data.len() as u64,
                e_tag: Some(o.e_tag.clone()),
                content_type: Some(o.content_type.clone()),
            })
            .ok_or_else(|| Error::not_found(format!("no such key: {bucket}/{key}"), ID))
    }

    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<MultipartId> {
        let mut state = self.lock();
        if state.faults.create {
            return Err(Self::injected("create_multipart"));
        }
        let id = MultipartId::new(uuid::Uuid::now_v7().to_string());
        state.sessions.insert(
            id.clone(),
            Session {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                content_type: content_type.to_owned(),
                parts: BTreeMap::new(),
            },
        );
        state.stats.created += 1;
        Ok(id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        part_number: u32,
        data: Bytes,
    ) -> Result<CompletedPart> {
        let delay = self.lock().faults.part_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.faults.part == Some(part_number) {
            return Err(Self::injected("upload_part"));
        }
        if part_number == 0 || part_number > 10_000 {
            return Err(Error::invalid_input(
                format!("part number {part_number} outside 1..=10000"),
                ID,
            ));
        }
        let session = state
            .sessions
            .get_mut(upload_id)
            .filter(|s| s.bucket == bucket && s.key == key)
            .ok_or_else(|| Error::not_found(format!("no such upload: {upload_id}"), ID))?;

        let e_tag = digest(&data);
        session.parts.insert(part_number, (e_tag.clone(), data));
        Ok(CompletedPart { part_number, e_tag })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        parts: &[CompletedPart],
    ) -> Result<PutOutput> {
        let mut state = self.lock();
        if state.faults.complete {
            return Err(Self::injected("complete_multipart"));
        }
        let session = state
            .sessions
            .get(upload_id)
            .filter(|s| s.bucket == bucket && s.key == key)
            .ok_or_else(|| Error::not_found(format!("no such upload: {upload_id}"), ID))?;

        if parts.is_empty() {
            return Err(Error::invalid_input("at least one part is required", ID));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(Error::invalid_input(
                "parts must be listed in ascending order",
                ID,
            ));
        }

        let mut data = BytesMut::new();
        let mut part_sizes = Vec::with_capacity(parts.len());
        let mut tags = String::new();
        for (index, part) in parts.iter().enumerate() {
            let (e_tag, bytes) = session
                .parts
                .get(&part.part_number)
                .filter(|(e_tag, _)| *e_tag == part.e_tag)
                .ok_or_else(|| {
                    Error::invalid_input(format!("invalid part {}", part.part_number), ID)
                })?;
            if index + 1 < parts.len() && bytes.len() < MIN_PART_SIZE {
                return Err(Error::invalid_input(
                    format!("part {} is smaller than the minimum", part.part_number),
                    ID,
                ));
            }
            data.extend_from_slice(bytes);
            part_sizes.push(bytes.len());
            tags.push_str(e_tag);
        }

        let e_tag = format!("{}-{}", digest(tags.as_bytes()), parts.len());
        let content_type = session.content_type.clone();
        state.sessions.remove(upload_id);
        state.objects.insert(
            (bucket.to_owned(), key.to_owned()),
            StoredObject {
                data: data.freeze(),
                content_type,
                e_tag: e_tag.clone(),
                part_sizes,
            },
        );
        state.stats.completed += 1;

        Ok(PutOutput {
            e_tag: Some(e_tag),
            version: None,
        })
    }

    async fn abort_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.faults.abort {
            return Err(Self::injected("abort_multipart"));
        }
        let owned = state
            .sessions
            .get(upload_id)
            .is_some_and(|s| s.bucket == bucket && s.key == key);
        if !owned {
            return Err(Error::not_found(format!("no such upload: {upload_id}"), ID));
        }
        state.sessions.remove(upload_id);
        state.stats.aborted += 1;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetOutput> {
        let state = self.lock();
        if state.faults.get {
            return Err(Self::injected("get_object"));
        }
        state
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .map(|o| GetOutput {
                data: o.data.clone(),
                content_type: Some(o.content_type.clone()),
                e_tag: Some(o.e_tag.clone()),
            })
            .ok_or_else(|| Error::not_found(format!("no such key: {bucket}/{key}"), ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const BUCKET: &str = "bucket";

    async fn open(provider: &MemoryProvider, key: &str) -> MultipartId {
        provider
            .create_multipart(BUCKET, key, "application/octet-stream")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn parts_are_invisible_until_complete() {
        let provider = MemoryProvider::new();
        let id = open(&provider, "a.bin").await;
        let part = provider
            .upload_part(BUCKET, "a.bin", &id, 1, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        assert!(!provider.contains(BUCKET, "a.bin"));
        assert_eq!(provider.open_sessions(), 1);

        let out = provider
            .complete_multipart(BUCKET, "a.bin", &id, &[part])
            .await
            .unwrap();
        assert!(out.e_tag.is_some_and(|t| t.ends_with("-1")));
        assert_eq!(provider.object(BUCKET, "a.bin").unwrap(), "abc");
        assert_eq!(provider.open_sessions(), 0);
    }

    #[tokio::test]
    async fn abort_discards_session() {
        let provider = MemoryProvider::new();
        let id = open(&provider, "a.bin").await;
        provider
            .upload_part(BUCKET, "a.bin", &id, 1, Bytes::from_static(b"abc"))
            .await
            .unwrap();
        provider.abort_multipart(BUCKET, "a.bin", &id).await.unwrap();

        assert!(provider.is_empty());
        assert_eq!(
            provider.stats(),
            MemoryStats {
                created: 1,
                completed: 0,
                aborted: 1
            }
        );

        let err = provider.abort_multipart(BUCKET, "a.bin", &id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn small_leading_part_is_rejected() {
        let provider = MemoryProvider::new();
        let id = open(&provider, "a.bin").await;
        let first = provider
            .upload_part(BUCKET, "a.bin", &id, 1, Bytes::from_static(b"tiny"))
            .await
            .unwrap();
        let second = provider
            .upload_part(BUCKET, "a.bin", &id, 2, Bytes::from_static(b"tail"))
            .await
            .unwrap();

        let err = provider
            .complete_multipart(BUCKET, "a.bin", &id, &[first, second])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(provider.open_sessions(), 1);
    }

    #[tokio::test]
    async fn out_of_order_parts_are_rejected() {
        let provider = MemoryProvider::new();
        let id = open(&provider, "a.bin").await;
        let big = Bytes::from(vec![0u8; MIN_PART_SIZE]);
        let first = provider
            .upload_part(BUCKET, "a.bin", &id, 1, big.clone())
            .await
            .unwrap();
        let second = provider
            .upload_part(BUCKET, "a.bin", &id, 2, big)
            .await
            .unwrap();

        let err = provider
            .complete_multipart(BUCKET, "a.bin", &id, &[second, first])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn records_part_sizes() {
        let provider = MemoryProvider::new();
        let id = open(&provider, "a.bin").await;
        let first = provider
            .upload_part(BUCKET, "a.bin", &id, 1, Bytes::from(vec![1u8; MIN_PART_SIZE]))
            .await
            .unwrap();
        let second = provider
            .upload_part(BUCKET, "a.bin", &id, 2, Bytes::from_static(b"rest"))
            .await
            .unwrap();
        provider
            .complete_multipart(BUCKET, "a.bin", &id, &[first, second])
            .await
            .unwrap();

        assert_eq!(
            provider.part_sizes(BUCKET, "a.bin"),
            Some(vec![MIN_PART_SIZE, 4])
        );
    }

    #[tokio::test]
    async fn zero_part_number_is_rejected() {
        let provider = MemoryProvider::new();
        let id = open(&provider, "a.bin").await;
        let err = provider
            .upload_part(BUCKET, "a.bin", &id, 0, Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[cfg(feature = "test-utils")]
    #[tokio::test]
    async fn injected_faults() {
        let provider = MemoryProvider::new();
        provider.fail_part(2);
        let id = open(&provider, "a.bin").await;
        assert!(
            provider
                .upload_part(BUCKET, "a.bin", &id, 1, Bytes::new())
                .await
                .is_ok()
        );
        let err = provider
            .upload_part(BUCKET, "a.bin", &id, 2, Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);

        provider.clear_faults();
        assert!(
            provider
                .upload_part(BUCKET, "a.bin", &id, 2, Bytes::new())
                .await
                .is_ok()
        );
    }
}
