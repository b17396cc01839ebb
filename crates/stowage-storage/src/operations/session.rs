//! Ownership of an open multipart session.

use stowage_object::{MultipartId, ObjectClient};

use crate::TRACING_TARGET_OPERATIONS;
use crate::error::{StorageError, TransferFailure};

/// An open multipart session that must end in complete or abort.
///
/// Consuming it with [`completed`](Self::completed) or
/// [`abort`](Self::abort) settles it. If it is dropped while still open,
/// the abort is spawned on the current Tokio runtime.
pub(crate) struct MultipartSession {
    client: ObjectClient,
    bucket: String,
    key: String,
    upload_id: MultipartId,
    open: bool,
}

impl MultipartSession {
    pub fn new(client: ObjectClient, bucket: &str, key: &str, upload_id: MultipartId) -> Self {
        Self {
            client,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id,
            open: true,
        }
    }

    pub fn id(&self) -> &MultipartId {
        &self.upload_id
    }

    /// Mark the session as committed.
    pub fn completed(mut self) {
        self.open = false;
    }

    /// Abort the session after `cause` and return the error to surface.
    ///
    /// A failed abort is logged and attached to `cause`.
    pub async fn abort(mut self, cause: TransferFailure) -> StorageError {
        let upload_id = &self.upload_id;
        let result = self
            .client
            .abort_multipart(&self.bucket, &self.key, upload_id)
            .await;
        self.open = false;

        match result {
            Ok(()) => {
                tracing::debug!(
                    target: TRACING_TARGET_OPERATIONS,
                    bucket = %self.bucket,
                    key = %self.key,
                    upload_id = %upload_id,
                    "multipart session aborted"
                );
                cause.into_error(None)
            }
            Err(abort_error) => {
                tracing::error!(
                    target: TRACING_TARGET_OPERATIONS,
                    bucket = %self.bucket,
                    key = %self.key,
                    upload_id = %upload_id,
                    call = cause.call,
                    cause = %cause.source,
                    error = %abort_error,
                    "failed to abort multipart session"
                );
                cause.into_error(Some(abort_error))
            }
        }
    }
}

impl Drop for MultipartSession {
    fn drop(&mut self) {
        if !self.open {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(
                target: TRACING_TARGET_OPERATIONS,
                bucket = %self.bucket,
                key = %self.key,
                upload_id = %self.upload_id,
                "multipart session left open without a runtime to abort it"
            );
            return;
        };

        let client = self.client.clone();
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        let upload_id = self.upload_id.clone();
        handle.spawn(async move {
            if let Err(error) = client.abort_multipart(&bucket, &key, &upload_id).await {
                tracing::error!(
                    target: TRACING_TARGET_OPERATIONS,
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %error,
                    "failed to abort interrupted multipart session"
                );
            } else {
                tracing::debug!(
                    target: TRACING_TARGET_OPERATIONS,
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    "interrupted multipart session aborted"
                );
            }
        });
    }
}
