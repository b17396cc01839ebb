//! Object store and storage facade configuration.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use stowage_object::{MemoryProvider, ObjectClient, S3Credentials, S3Provider};
use stowage_storage::{Storage, StorageConfig, StorageTelemetry};

use crate::TRACING_TARGET_CONFIG;

/// Object store implementation to connect to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Any S3-compatible service.
    #[default]
    S3,
    /// Process-local store; contents are lost on exit.
    Memory,
}

/// Object store connection plus the storage facade settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct StorageBackendConfig {
    /// Object store implementation.
    #[arg(long = "storage-backend", env = "STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::S3)]
    #[serde(default)]
    pub backend: StorageBackend,

    /// Region sent with S3 requests.
    #[arg(long = "storage-region", env = "STORAGE_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Static access key ID. Falls back to the default AWS credential chain when unset.
    #[arg(long = "storage-access-key-id", env = "STORAGE_ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,

    /// Static secret access key, paired with the access key ID.
    #[arg(
        long = "storage-secret-access-key",
        env = "STORAGE_SECRET_ACCESS_KEY",
        hide_env_values = true
    )]
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,

    #[clap(flatten)]
    pub storage: StorageConfig,
}

impl StorageBackendConfig {
    /// Validates the facade settings and the credential pair.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.storage.validate()?;
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            anyhow::bail!("access key ID and secret access key must be set together");
        }
        Ok(())
    }

    /// Connects the configured backend and builds the storage facade.
    ///
    /// Instruments are taken from the global OpenTelemetry providers, so
    /// telemetry must be installed first.
    pub async fn connect(&self) -> anyhow::Result<Storage> {
        let client = match self.backend {
            StorageBackend::S3 => {
                let credentials = S3Credentials {
                    region: self.region.clone(),
                    endpoint: self.storage.endpoint_url.clone(),
                    access_key_id: self.access_key_id.clone(),
                    secret_access_key: self.secret_access_key.clone(),
                    session_token: None,
                };
                let provider = S3Provider::connect(&credentials)
                    .await
                    .context("failed to create S3 client")?;
                ObjectClient::new(provider)
            }
            StorageBackend::Memory => ObjectClient::new(MemoryProvider::new()),
        };

        Storage::new(client, &self.storage, StorageTelemetry::from_global())
            .context("invalid storage configuration")
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            backend = ?self.backend,
            bucket = %self.storage.bucket,
            endpoint = self.storage.endpoint_url.as_deref(),
            region = %self.region,
            static_credentials = self.access_key_id.is_some(),
            part_concurrency = self.storage.part_concurrency,
            pacing_min_ms = self.storage.pacing_min_ms,
            pacing_max_ms = self.storage.pacing_max_ms,
            "Storage configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> StorageBackendConfig {
        StorageBackendConfig {
            backend: StorageBackend::Memory,
            region: "us-east-1".to_owned(),
            access_key_id: None,
            secret_access_key: None,
            storage: StorageConfig::new("demo"),
        }
    }

    #[test]
    fn reject_half_credentials() {
        let config = StorageBackendConfig {
            access_key_id: Some("minioadmin".to_owned()),
            ..memory_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn secret_is_not_serialized() {
        let config = StorageBackendConfig {
            access_key_id: Some("minioadmin".to_owned()),
            secret_access_key: Some("hunter2".to_owned()),
            ..memory_config()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[tokio::test]
    async fn memory_backend_roundtrip() -> anyhow::Result<()> {
        let storage = memory_config()
            .connect()
            .await?
            .with_pacing(stowage_storage::Pacing::none());

        storage
            .upload("a.txt", bytes::Bytes::from_static(b"hi"), "text/plain")
            .await?;
        assert_eq!(storage.download("a.txt").await?.as_ref(), b"hi");
        Ok(())
    }
}
