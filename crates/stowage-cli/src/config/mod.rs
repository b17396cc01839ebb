//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig            # Host, port, shutdown, upload limit
//! ├── storage: StorageBackendConfig   # Backend, credentials, bucket, pacing
//! └── telemetry: TelemetryConfig      # OTLP export, log format
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod server;
mod storage;
mod telemetry;

use std::process;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

pub use self::server::ServerConfig;
pub use self::storage::{StorageBackend, StorageBackendConfig};
pub use self::telemetry::{LogFormat, TelemetryConfig};
use crate::TRACING_TARGET_SERVER_STARTUP;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "stowage")]
#[command(about = "Instrumented create-once object storage server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Object store connection and transfer tuning.
    #[clap(flatten)]
    pub storage: StorageBackendConfig,

    /// Logging and OpenTelemetry export.
    #[clap(flatten)]
    pub telemetry: TelemetryConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its values
    /// act as environment defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.storage
            .validate()
            .context("invalid storage configuration")?;
        self.telemetry
            .validate()
            .context("invalid telemetry configuration")?;
        Ok(())
    }

    /// Logs configuration (no secrets).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        self.server.log();
        self.storage.log();
        self.telemetry.log();
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_from_empty_args() {
        let cli = Cli::try_parse_from(["stowage"]).unwrap();

        assert_eq!(cli.server.port, 8000);
        assert_eq!(cli.storage.storage.bucket, "demo");
        assert_eq!(cli.telemetry.service_name, "stowage");
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "stowage",
            "--port",
            "9100",
            "--storage-backend",
            "memory",
            "--storage-bucket",
            "uploads",
            "--storage-pacing-min-ms",
            "0",
            "--storage-pacing-max-ms",
            "0",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.server.port, 9100);
        assert_eq!(cli.storage.backend, StorageBackend::Memory);
        assert_eq!(cli.storage.storage.bucket, "uploads");
        assert_eq!(cli.telemetry.log_format, LogFormat::Json);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn inverted_pacing_is_rejected() {
        let cli = Cli::try_parse_from([
            "stowage",
            "--storage-pacing-min-ms",
            "300",
            "--storage-pacing-max-ms",
            "100",
        ])
        .unwrap();

        assert!(cli.validate().is_err());
    }
}
