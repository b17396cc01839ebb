use bytes::Bytes;

use super::Target;
use crate::TRACING_TARGET_OPERATIONS;
use crate::error::{Result, StorageError};

/// Fetch the whole object stored under `key`.
pub(crate) async fn download(target: Target<'_>, key: &str) -> Result<Bytes> {
    let output = target
        .client
        .get(target.bucket, key)
        .await
        .map_err(|source| {
            if source.is_not_found() {
                StorageError::NotFound {
                    bucket: target.bucket.to_owned(),
                    key: key.to_owned(),
                    source,
                }
            } else {
                StorageError::transfer("get_object", source)
            }
        })?;

    tracing::debug!(
        target: TRACING_TARGET_OPERATIONS,
        bucket = target.bucket,
        key,
        size = output.size(),
        "object downloaded"
    );
    Ok(output.data)
}
