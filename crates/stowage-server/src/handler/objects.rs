//! Upload and download of whole objects.
//!
//! Uploads are create-once: a second upload under the same key is rejected
//! with `409 Conflict` and leaves the stored object untouched.

use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use stowage_storage::Storage;

use super::response::UploadedObject;
use super::{ErrorKind, Result};
use crate::service::ServiceState;

/// Tracing target for object operations.
const TRACING_TARGET: &str = "stowage_server::handler::objects";

/// Content type stored when the request does not name one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[tracing::instrument(skip_all, fields(key = %key))]
async fn upload_object(
    State(storage): State<Storage>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<UploadedObject>)> {
    let data = body.map_err(|rejection| {
        let kind = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorKind::PayloadTooLarge
        } else {
            ErrorKind::BadRequest
        };
        kind.with_context(rejection.body_text())
    })?;

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    tracing::debug!(
        target: TRACING_TARGET,
        size = data.len(),
        content_type,
        "uploading object"
    );

    let output = storage.upload(&key, data, content_type).await?;

    tracing::info!(
        target: TRACING_TARGET,
        size = output.size,
        parts = output.parts,
        "object uploaded"
    );

    Ok((StatusCode::CREATED, Json(output.into())))
}

#[tracing::instrument(skip_all, fields(key = %key))]
async fn download_object(
    State(storage): State<Storage>,
    Path(key): Path<String>,
) -> Result<(HeaderMap, Bytes)> {
    let data = storage.download(&key).await?;

    tracing::debug!(target: TRACING_TARGET, size = data.len(), "object downloaded");

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len()));
    Ok((headers, data))
}

/// Object routes. Keys may contain `/`.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/upload/{*key}", post(upload_object))
        .route("/download/{*key}", get(download_object))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use bytes::Bytes;
    use stowage_object::MemoryProvider;

    use crate::handler::response::UploadedObject;
    use crate::handler::test::{
        TEST_BODY_LIMIT, create_test_server, create_test_server_with_provider,
    };

    #[tokio::test]
    async fn upload_then_download() -> anyhow::Result<()> {
        let server = create_test_server()?;

        let response = server
            .post("/upload/notes.txt")
            .content_type("text/plain")
            .bytes(Bytes::from_static(b"hello"))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.assert_json(&UploadedObject {
            key: "notes.txt".into(),
            size: 5,
        });

        let response = server.get("/download/notes.txt").await;
        response.assert_status_ok();
        response.assert_header("content-type", "application/octet-stream");
        response.assert_header("content-length", "5");
        assert_eq!(response.as_bytes().as_ref(), b"hello");
        Ok(())
    }

    #[tokio::test]
    async fn nested_keys_are_kept_whole() -> anyhow::Result<()> {
        let provider = MemoryProvider::new();
        let server = create_test_server_with_provider(provider.clone())?;

        server
            .post("/upload/reports/2024/q3.csv")
            .bytes(Bytes::from_static(b"a,b"))
            .await
            .assert_status(StatusCode::CREATED);

        assert!(provider.contains("demo", "reports/2024/q3.csv"));
        Ok(())
    }

    #[tokio::test]
    async fn second_upload_conflicts() -> anyhow::Result<()> {
        let provider = MemoryProvider::new();
        let server = create_test_server_with_provider(provider.clone())?;

        server
            .post("/upload/a.txt")
            .bytes(Bytes::from_static(b"first"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/upload/a.txt")
            .bytes(Bytes::from_static(b"second"))
            .expect_failure()
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "conflict");
        assert_eq!(body["resource"], "a.txt");
        assert!(body.get("context").is_none());

        assert_eq!(
            provider.object("demo", "a.txt"),
            Some(Bytes::from_static(b"first"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_object_is_404() -> anyhow::Result<()> {
        let server = create_test_server()?;

        let response = server.get("/download/missing.bin").expect_failure().await;
        response.assert_status_not_found();

        let body: serde_json::Value = response.json();
        assert_eq!(body["resource"], "missing.bin");
        Ok(())
    }

    #[tokio::test]
    async fn store_failure_is_500() -> anyhow::Result<()> {
        let provider = MemoryProvider::new();
        let server = create_test_server_with_provider(provider.clone())?;
        provider.fail_part(1);

        let response = server
            .post("/upload/a.txt")
            .bytes(Bytes::from_static(b"data"))
            .expect_failure()
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "internal_server_error");
        assert!(!provider.contains("demo", "a.txt"));
        assert_eq!(provider.open_sessions(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn get_failure_is_500() -> anyhow::Result<()> {
        let provider = MemoryProvider::new();
        let server = create_test_server_with_provider(provider.clone())?;
        provider.fail_get();

        server
            .get("/download/a.txt")
            .expect_failure()
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_body_is_413() -> anyhow::Result<()> {
        let provider = MemoryProvider::new();
        let server = create_test_server_with_provider(provider.clone())?;

        let response = server
            .post("/upload/big.bin")
            .bytes(Bytes::from(vec![0u8; TEST_BODY_LIMIT + 1]))
            .expect_failure()
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "payload_too_large");
        assert!(provider.is_empty());
        Ok(())
    }
}
