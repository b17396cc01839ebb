//! Backend trait and the cloneable [`ObjectClient`] handle.
//!
//! [`ObjectBackend`] is the narrow seam every store implements: an existence
//! check, the multipart lifecycle, and whole-object retrieval. Every call is
//! addressed by bucket and key so a single backend can serve many buckets.
//!
//! [`ObjectClient`] wraps `Arc<dyn ObjectBackend>` and instruments each call
//! with [`tracing`]. When a `tracing-opentelemetry` layer is installed, the
//! call spans are exported and nest under the active OpenTelemetry span.

use std::sync::Arc;

use bytes::Bytes;
use opentelemetry::Context;
use opentelemetry::trace::TraceContextExt;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::types::{CompletedPart, MultipartId, ObjectHead, Result};

mod get_output;
mod put_output;

pub use get_output::GetOutput;
pub use put_output::PutOutput;

/// Calls the storage layer needs from an object store.
#[async_trait::async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
    /// Unique identifier used in error labels (e.g. "s3", "memory").
    fn id(&self) -> &'static str;

    /// Fetch object metadata without the body.
    ///
    /// Absence is reported as an error whose kind is
    /// [`ErrorKind::NotFound`](crate::ErrorKind::NotFound).
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead>;

    /// Open a multipart session for `key`.
    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<MultipartId>;

    /// Upload one part of an open session.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        part_number: u32,
        data: Bytes,
    ) -> Result<CompletedPart>;

    /// Commit the session; the object becomes visible atomically.
    ///
    /// `parts` must be ordered by ascending part number.
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        parts: &[CompletedPart],
    ) -> Result<PutOutput>;

    /// Discard the session and every part uploaded to it.
    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &MultipartId)
    -> Result<()>;

    /// Retrieve the whole object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetOutput>;
}

/// Cloneable handle to any [`ObjectBackend`].
#[derive(Clone)]
pub struct ObjectClient(Arc<dyn ObjectBackend>);

impl ObjectClient {
    /// Wrap a concrete backend.
    pub fn new(backend: impl ObjectBackend) -> Self {
        Self(Arc::new(backend))
    }

    /// Wrap an already shared backend.
    pub fn from_arc(backend: Arc<dyn ObjectBackend>) -> Self {
        Self(backend)
    }

    /// Identifier of the wrapped backend.
    pub fn backend_id(&self) -> &'static str {
        self.0.id()
    }

    #[tracing::instrument(name = "object.head", skip(self))]
    pub async fn head(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        adopt_active_context();
        self.0.head_object(bucket, key).await
    }

    /// Whether `key` currently exists.
    ///
    /// Not-found maps to `Ok(false)`; any other failure is propagated.
    pub async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.head(bucket, key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[tracing::instrument(name = "object.create_multipart", skip(self))]
    pub async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<MultipartId> {
        adopt_active_context();
        self.0.create_multipart(bucket, key, content_type).await
    }

    #[tracing::instrument(
        name = "object.upload_part",
        skip(self, upload_id, data),
        fields(size = data.len())
    )]
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        part_number: u32,
        data: Bytes,
    ) -> Result<CompletedPart> {
        adopt_active_context();
        self.0
            .upload_part(bucket, key, upload_id, part_number, data)
            .await
    }

    #[tracing::instrument(
        name = "object.complete_multipart",
        skip(self, upload_id, parts),
        fields(parts = parts.len())
    )]
    pub async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        parts: &[CompletedPart],
    ) -> Result<PutOutput> {
        adopt_active_context();
        self.0
            .complete_multipart(bucket, key, upload_id, parts)
            .await
    }

    #[tracing::instrument(
        name = "object.abort_multipart",
        skip(self, upload_id),
        fields(upload_id = %upload_id)
    )]
    pub async fn abort_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
    ) -> Result<()> {
        adopt_active_context();
        self.0.abort_multipart(bucket, key, upload_id).await
    }

    /// Retrieve the raw bytes and metadata stored at `key`.
    #[tracing::instrument(name = "object.get", skip(self))]
    pub async fn get(&self, bucket: &str, key: &str) -> Result<GetOutput> {
        adopt_active_context();
        self.0.get_object(bucket, key).await
    }
}

/// Parent the current call span on the active OpenTelemetry context.
///
/// The `tracing` parent of a call span is whatever span the caller is in,
/// which skips any span the caller attached directly through OpenTelemetry.
fn adopt_active_context() {
    let cx = Context::current();
    if cx.has_active_span() {
        tracing::Span::current().set_parent(cx);
    }
}

impl std::fmt::Debug for ObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectClient").field(&self.0.id()).finish()
    }
}
