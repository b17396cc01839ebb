//! Logging and OpenTelemetry export configuration.

use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Output format of the console log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored when attached to a terminal.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging and OTLP export configuration.
///
/// Exporter endpoints and headers come from the standard
/// `OTEL_EXPORTER_OTLP_*` variables.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Export spans, metrics and logs over OTLP.
    #[arg(long = "otel-enabled", env = "OTEL_ENABLED")]
    #[serde(default)]
    pub enabled: bool,

    /// `service.name` resource attribute.
    #[arg(long = "otel-service-name", env = "OTEL_SERVICE_NAME", default_value = "stowage")]
    pub service_name: String,

    /// Metric export interval in milliseconds.
    #[arg(
        long = "otel-metric-export-interval",
        env = "OTEL_METRIC_EXPORT_INTERVAL",
        default_value_t = 10_000
    )]
    pub metric_export_interval: u64,

    /// Console log format.
    #[arg(long = "log-format", env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    /// Returns the metric export interval as a `Duration`.
    #[must_use]
    pub const fn metric_export_interval(&self) -> Duration {
        Duration::from_millis(self.metric_export_interval)
    }

    /// Validates the export settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service_name.trim().is_empty() {
            anyhow::bail!("OTel service name must not be empty");
        }
        if self.metric_export_interval == 0 {
            anyhow::bail!("Metric export interval must be greater than zero");
        }
        Ok(())
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            otel_enabled = self.enabled,
            service_name = %self.service_name,
            metric_export_interval_ms = self.metric_export_interval,
            log_format = ?self.log_format,
            "Telemetry configuration"
        );
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "stowage".to_owned(),
            metric_export_interval: 10_000,
            log_format: LogFormat::Pretty,
        }
    }
}
