//! Create-once multipart upload.
//!
//! 1. Probe the key; an existing object is a conflict.
//! 2. Wait for the pacing delay.
//! 3. Split the payload into [`PART_SIZE`] chunks.
//! 4. Open a session, upload the parts, complete the session.
//!
//! Any failure after the session opens aborts it before the error is
//! returned. Chunks are zero-copy slices of the payload.

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use stowage_object::CompletedPart;

use super::session::MultipartSession;
use super::{Target, TransferOptions};
use crate::TRACING_TARGET_OPERATIONS;
use crate::conventions::{MAX_PARTS, PART_SIZE};
use crate::error::{Result, StorageError, TransferFailure};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutput {
    /// Key the object was stored under.
    pub key: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Number of parts the payload was sent in.
    pub parts: usize,
    /// Entity tag of the new object, if the store returned one.
    pub e_tag: Option<String>,
}

pub(crate) async fn upload(
    target: Target<'_>,
    options: &TransferOptions,
    key: &str,
    data: Bytes,
    content_type: &str,
) -> Result<UploadOutput> {
    ensure_absent(target, key).await?;
    options.pacing.wait().await;

    let size = data.len() as u64;
    let chunks = split(data, PART_SIZE);
    if chunks.len() > MAX_PARTS {
        return Err(StorageError::Unknown(format!(
            "payload of {size} bytes needs {} parts, more than the {MAX_PARTS} allowed",
            chunks.len()
        )));
    }

    let upload_id = target
        .client
        .create_multipart(target.bucket, key, content_type)
        .await
        .map_err(|e| StorageError::transfer("create_multipart_upload", e))?;
    let session = MultipartSession::new(target.client.clone(), target.bucket, key, upload_id);

    tracing::debug!(
        target: TRACING_TARGET_OPERATIONS,
        bucket = target.bucket,
        key,
        upload_id = %session.id(),
        parts = chunks.len(),
        size,
        "multipart session opened"
    );

    let parts = chunks.len();
    match transfer(target, options, key, &session, chunks).await {
        Ok(e_tag) => {
            session.completed();
            Ok(UploadOutput {
                key: key.to_owned(),
                size,
                parts,
                e_tag,
            })
        }
        Err(cause) => Err(session.abort(cause).await),
    }
}

async fn ensure_absent(target: Target<'_>, key: &str) -> Result<()> {
    let exists = target
        .client
        .exists(target.bucket, key)
        .await
        .map_err(|e| StorageError::transfer("head_object", e))?;

    if exists {
        return Err(StorageError::Conflict {
            bucket: target.bucket.to_owned(),
            key: key.to_owned(),
        });
    }
    Ok(())
}

/// Upload every chunk, then commit the session.
async fn transfer(
    target: Target<'_>,
    options: &TransferOptions,
    key: &str,
    session: &MultipartSession,
    chunks: Vec<Bytes>,
) -> Result<Option<String>, TransferFailure> {
    let upload_id = session.id();
    let uploads = (1u32..).zip(chunks).map(|(part_number, chunk)| async move {
        target
            .client
            .upload_part(target.bucket, key, upload_id, part_number, chunk)
            .await
            .map_err(|e| TransferFailure::new("upload_part", e))
    });

    let mut parts: Vec<CompletedPart> = stream::iter(uploads)
        .buffer_unordered(options.part_concurrency.max(1))
        .try_collect()
        .await?;
    parts.sort_unstable_by_key(|part| part.part_number);

    let output = target
        .client
        .complete_multipart(target.bucket, key, upload_id, &parts)
        .await
        .map_err(|e| TransferFailure::new("complete_multipart_upload", e))?;
    Ok(output.e_tag)
}

/// Split `data` into consecutive `part_size` chunks.
///
/// The last chunk holds the remainder. An empty payload yields a single
/// empty chunk, since a multipart session needs at least one part.
fn split(data: Bytes, part_size: usize) -> Vec<Bytes> {
    if data.is_empty() {
        return vec![data];
    }
    (0..data.len())
        .step_by(part_size)
        .map(|start| data.slice(start..data.len().min(start + part_size)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_exact_multiple() {
        let data = Bytes::from(vec![7u8; 2 * PART_SIZE]);
        let sizes: Vec<_> = split(data, PART_SIZE).iter().map(Bytes::len).collect();
        assert_eq!(sizes, [PART_SIZE, PART_SIZE]);
    }

    #[test]
    fn split_with_remainder() {
        let data = Bytes::from(vec![7u8; 12 * 1024 * 1024]);
        let sizes: Vec<_> = split(data, PART_SIZE).iter().map(Bytes::len).collect();
        assert_eq!(sizes, [PART_SIZE, PART_SIZE, 2 * 1024 * 1024]);
    }

    #[test]
    fn split_small_payload() {
        let chunks = split(Bytes::from_static(b"hello"), PART_SIZE);
        assert_eq!(chunks, [Bytes::from_static(b"hello")]);
    }

    #[test]
    fn split_empty_payload() {
        let chunks = split(Bytes::new(), PART_SIZE);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
    }

    #[test]
    fn split_preserves_order() {
        let data: Bytes = (0u8..10).collect::<Vec<_>>().into();
        let chunks = split(data.clone(), 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), data.to_vec());
    }
}
