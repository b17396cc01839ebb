//! The instrumented storage facade.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
#[cfg(feature = "config")]
use clap::Args;
use opentelemetry::trace::FutureExt;
use serde::{Deserialize, Serialize};
use stowage_object::ObjectClient;

use crate::conventions::OperationName;
use crate::error::{ConfigError, Result};
use crate::operations::{self, Pacing, Target, TransferOptions, UploadOutput, saturating_millis};
use crate::telemetry::{OperationGuard, ServerEndpoint, StorageTelemetry, common_attributes};
use crate::{TRACING_TARGET_STORAGE, StorageError};

/// Storage facade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct StorageConfig {
    /// Bucket every operation targets.
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-bucket", env = "STORAGE_BUCKET", default_value = "demo")
    )]
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Object store endpoint URL, e.g. `http://localhost:9000`.
    ///
    /// Also the source of the `server.address` and `server.port` attributes.
    #[cfg_attr(
        feature = "config",
        arg(long = "storage-endpoint-url", env = "STORAGE_ENDPOINT_URL")
    )]
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Number of parts uploaded concurrently. 1 uploads sequentially.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "storage-part-concurrency",
            env = "STORAGE_PART_CONCURRENCY",
            default_value_t = 4
        )
    )]
    #[serde(default = "default_part_concurrency")]
    pub part_concurrency: usize,

    /// Lower bound of the pre-transfer delay in milliseconds.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "storage-pacing-min-ms",
            env = "STORAGE_PACING_MIN_MS",
            default_value_t = 100
        )
    )]
    #[serde(default = "default_pacing_min_ms")]
    pub pacing_min_ms: u64,

    /// Upper bound of the pre-transfer delay in milliseconds.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "storage-pacing-max-ms",
            env = "STORAGE_PACING_MAX_MS",
            default_value_t = 200
        )
    )]
    #[serde(default = "default_pacing_max_ms")]
    pub pacing_max_ms: u64,
}

fn default_bucket() -> String {
    "demo".to_owned()
}

fn default_part_concurrency() -> usize {
    4
}

fn default_pacing_min_ms() -> u64 {
    100
}

fn default_pacing_max_ms() -> u64 {
    200
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            endpoint_url: None,
            part_concurrency: default_part_concurrency(),
            pacing_min_ms: default_pacing_min_ms(),
            pacing_max_ms: default_pacing_max_ms(),
        }
    }
}

impl StorageConfig {
    /// Configuration for `bucket` with default tuning.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Set the endpoint URL.
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Set the part concurrency.
    pub fn with_part_concurrency(mut self, part_concurrency: usize) -> Self {
        self.part_concurrency = part_concurrency;
        self
    }

    /// Set the pacing bounds; equal bounds give a fixed delay.
    pub fn with_pacing(mut self, min: Duration, max: Duration) -> Self {
        self.pacing_min_ms = saturating_millis(min);
        self.pacing_max_ms = saturating_millis(max);
        self
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is empty, the endpoint does not parse,
    /// the pacing bounds are inverted, or the part concurrency is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_parts().map(|_| ())
    }

    /// Parsed endpoint, if one is configured.
    pub fn endpoint(&self) -> Result<Option<ServerEndpoint>, ConfigError> {
        self.endpoint_url
            .as_deref()
            .map(ServerEndpoint::parse)
            .transpose()
    }

    /// Pacing policy described by the bounds.
    pub fn pacing(&self) -> Result<Pacing, ConfigError> {
        Pacing::uniform(
            Duration::from_millis(self.pacing_min_ms),
            Duration::from_millis(self.pacing_max_ms),
        )
    }

    fn build_parts(&self) -> Result<(Option<ServerEndpoint>, TransferOptions), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::EmptyBucket);
        }
        if self.part_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let options = TransferOptions {
            part_concurrency: self.part_concurrency,
            pacing: self.pacing()?,
        };
        Ok((self.endpoint()?, options))
    }
}

struct StorageInner {
    client: ObjectClient,
    bucket: String,
    endpoint: Option<ServerEndpoint>,
    options: TransferOptions,
    telemetry: StorageTelemetry,
}

/// Instrumented create-once storage bound to one bucket.
///
/// Cheap to clone; clones share the client and the instruments.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl Storage {
    /// Create a facade over `client`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(
        client: ObjectClient,
        config: &StorageConfig,
        telemetry: StorageTelemetry,
    ) -> Result<Self, ConfigError> {
        let (endpoint, options) = config.build_parts()?;

        tracing::info!(
            target: TRACING_TARGET_STORAGE,
            backend = client.backend_id(),
            bucket = %config.bucket,
            endpoint = config.endpoint_url.as_deref(),
            part_concurrency = options.part_concurrency,
            "storage initialized"
        );

        Ok(Self {
            inner: Arc::new(StorageInner {
                client,
                bucket: config.bucket.clone(),
                endpoint,
                options,
                telemetry,
            }),
        })
    }

    /// Replace the pacing policy.
    pub fn with_pacing(self, pacing: Pacing) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(StorageInner {
                client: inner.client.clone(),
                bucket: inner.bucket.clone(),
                endpoint: inner.endpoint.clone(),
                options: TransferOptions {
                    pacing,
                    ..inner.options
                },
                telemetry: inner.telemetry.clone(),
            }),
        }
    }

    /// Bucket every operation targets.
    pub fn bucket(&self) -> &str {
        &self.inner.bucket
    }

    /// Parsed object store endpoint, if configured.
    pub fn endpoint(&self) -> Option<&ServerEndpoint> {
        self.inner.endpoint.as_ref()
    }

    /// Store `data` under `key`, refusing to overwrite an existing object.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`] if the key already exists.
    /// - [`StorageError::Transfer`] if a store call fails. An open session
    ///   is aborted first; a failing abort is attached to the error.
    /// - [`StorageError::Unknown`] if the payload needs more parts than the
    ///   store allows.
    pub async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<UploadOutput> {
        let options = self.inner.options;
        self.instrument(OperationName::Upload, key, async {
            operations::upload(self.target(), &options, key, data, content_type).await
        })
        .await
    }

    /// Fetch the object stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no object exists under the key.
    /// - [`StorageError::Transfer`] if the store call fails.
    pub async fn download(&self, key: &str) -> Result<Bytes> {
        self.instrument(OperationName::Download, key, async {
            operations::download(self.target(), key).await
        })
        .await
    }

    fn target(&self) -> Target<'_> {
        Target {
            client: &self.inner.client,
            bucket: &self.inner.bucket,
        }
    }

    /// Run `body` inside one span, one duration sample, and one balanced
    /// pair of gauge updates.
    ///
    /// The span is the current OpenTelemetry context while `body` is polled.
    async fn instrument<T, F>(&self, operation: OperationName, key: &str, body: F) -> Result<T>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let inner = &self.inner;
        let attributes = common_attributes(&inner.bucket, inner.endpoint.as_ref(), operation);
        let guard = OperationGuard::start(&inner.telemetry, operation, &inner.bucket, key, attributes);

        let result = body.with_context(guard.context()).await;
        guard.finish(&result);
        result
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("client", &self.inner.client)
            .field("bucket", &self.inner.bucket)
            .field("endpoint", &self.inner.endpoint)
            .finish_non_exhaustive()
    }
}
