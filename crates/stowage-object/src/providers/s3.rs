//! S3-compatible backend built on [`aws_sdk_s3`].
//!
//! Works with AWS S3, MinIO, LocalStack, and any S3-compatible service.
//! A custom endpoint switches the client to path-style addressing.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::client::{GetOutput, ObjectBackend, PutOutput};
use crate::types::{CompletedPart, Error, MultipartId, ObjectHead, Result};

const ID: &str = "s3";

/// Connection settings for an S3-compatible service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Credentials {
    /// AWS region (defaults to `us-east-1`).
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint URL (e.g. `http://localhost:9000` for MinIO).
    /// Required for non-AWS S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Access key ID for static credentials.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key for static credentials.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Session token for temporary credentials.
    #[serde(default)]
    pub session_token: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// S3-backed [`ObjectBackend`].
#[derive(Debug, Clone)]
pub struct S3Provider {
    client: Client,
}

impl S3Provider {
    /// Build a client from `creds`.
    ///
    /// Static credentials are used when both the access key and the secret
    /// are present; otherwise the default AWS credential chain applies.
    pub async fn connect(creds: &S3Credentials) -> Result<Self> {
        let region = if creds.region.is_empty() {
            default_region()
        } else {
            creds.region.clone()
        };
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));

        match (&creds.access_key_id, &creds.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    creds.session_token.clone(),
                    None,
                    "stowage",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(Error::invalid_input(
                    "access key id and secret access key must be set together",
                    ID,
                ));
            }
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &creds.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            target: crate::TRACING_TARGET,
            endpoint = creds.endpoint.as_deref(),
            "s3 client configured"
        );
        Ok(Self::from_client(Client::from_conf(builder.build())))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Convert an SDK failure into a crate [`Error`].
fn from_sdk<E>(err: SdkError<E>, call: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = format!("{call}: {}", DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            return Error::connection(message, ID, true).with_source(err);
        }
        SdkError::ConstructionFailure(_) => {
            return Error::invalid_input(message, ID).with_source(err);
        }
        _ => {}
    }

    let code = err.as_service_error().and_then(|e| e.code());
    let status = err.raw_response().map(|r| r.status().as_u16());
    let not_found = matches!(
        code,
        Some("NoSuchKey" | "NoSuchUpload" | "NoSuchBucket" | "NotFound")
    ) || status == Some(404);
    let retryable = matches!(
        code,
        Some("SlowDown" | "InternalError" | "ServiceUnavailable" | "RequestTimeout")
    ) || status.is_some_and(|s| s >= 500);

    if not_found {
        Error::not_found(message, ID).with_source(err)
    } else {
        Error::runtime(message, ID, retryable).with_source(err)
    }
}

#[async_trait::async_trait]
impl ObjectBackend for S3Provider {
    fn id(&self) -> &'static str {
        ID
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk(e, "head_object"))?;

        Ok(ObjectHead {
            size: output.content_length().unwrap_or_default().max(0) as u64,
            e_tag: output.e_tag().map(str::to_owned),
            content_type: output.content_type().map(str::to_owned),
        })
    }

    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<MultipartId> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| from_sdk(e, "create_multipart_upload"))?;

        output
            .upload_id()
            .map(MultipartId::new)
            .ok_or_else(|| Error::runtime("response is missing the upload id", ID, false))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        part_number: u32,
        data: Bytes,
    ) -> Result<CompletedPart> {
        let number = i32::try_from(part_number)
            .map_err(|_| Error::invalid_input(format!("part number {part_number} too large"), ID))?;
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id.as_str())
            .part_number(number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| from_sdk(e, "upload_part"))?;

        let e_tag = output
            .e_tag()
            .ok_or_else(|| Error::runtime("response is missing the part etag", ID, false))?;
        Ok(CompletedPart {
            part_number,
            e_tag: e_tag.to_owned(),
        })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
        parts: &[CompletedPart],
    ) -> Result<PutOutput> {
        let mut completed = Vec::with_capacity(parts.len());
        for part in parts {
            let number = i32::try_from(part.part_number).map_err(|_| {
                Error::invalid_input(format!("part number {} too large", part.part_number), ID)
            })?;
            completed.push(
                S3CompletedPart::builder()
                    .part_number(number)
                    .e_tag(&part.e_tag)
                    .build(),
            );
        }

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id.as_str())
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| from_sdk(e, "complete_multipart_upload"))?;

        Ok(PutOutput {
            e_tag: output.e_tag().map(str::to_owned),
            version: output.version_id().map(str::to_owned),
        })
    }

    async fn abort_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &MultipartId,
    ) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id.as_str())
            .send()
            .await
            .map_err(|e| from_sdk(e, "abort_multipart_upload"))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetOutput> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk(e, "get_object"))?;

        let content_type = output.content_type().map(str::to_owned);
        let e_tag = output.e_tag().map(str::to_owned);
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| Error::connection(format!("get_object: {e}"), ID, true).with_source(e))?
            .into_bytes();

        Ok(GetOutput {
            data,
            content_type,
            e_tag,
        })
    }
}
