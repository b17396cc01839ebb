//! Log subscriber and OpenTelemetry provider setup.
//!
//! With export disabled only the console subscriber is installed and the
//! global OpenTelemetry providers stay no-op, so the storage instruments
//! cost nothing. With export enabled spans, metrics and logs go out over
//! OTLP/HTTP to the collector named by `OTEL_EXPORTER_OTLP_*`.
//!
//! `tracing` spans (HTTP requests, object-store calls) reach the span
//! exporter through `tracing-opentelemetry`, so they share traces with the
//! storage spans. Log records pick up the span of the attached
//! OpenTelemetry context.

use anyhow::Context;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::Metadata;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::TRACING_TARGET_TELEMETRY;
use crate::config::{LogFormat, TelemetryConfig};

/// Targets never forwarded to the OTLP exporters. The exporter's own HTTP
/// stack logs and opens spans through `tracing`, and forwarding those would
/// feed the exporter with its own traffic.
const EXCLUDED_LOG_TARGETS: [&str; 5] = ["opentelemetry", "hyper", "reqwest", "h2", "tower"];

/// SDK providers installed as the OpenTelemetry globals.
struct Providers {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
    logger: SdkLoggerProvider,
}

impl Providers {
    fn install(config: &TelemetryConfig) -> anyhow::Result<Self> {
        let resource = Resource::builder()
            .with_service_name(config.service_name.clone())
            .build();

        let span_exporter = SpanExporter::builder()
            .with_http()
            .build()
            .context("failed to build OTLP span exporter")?;
        let tracer = SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(resource.clone())
            .build();

        let metric_exporter = MetricExporter::builder()
            .with_http()
            .build()
            .context("failed to build OTLP metric exporter")?;
        let reader = PeriodicReader::builder(metric_exporter)
            .with_interval(config.metric_export_interval())
            .build();
        let meter = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource.clone())
            .build();

        let log_exporter = LogExporter::builder()
            .with_http()
            .build()
            .context("failed to build OTLP log exporter")?;
        let logger = SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build();

        global::set_tracer_provider(tracer.clone());
        global::set_meter_provider(meter.clone());

        Ok(Self {
            tracer,
            meter,
            logger,
        })
    }

    fn shutdown(self) {
        let results = [
            ("tracer", self.tracer.shutdown()),
            ("meter", self.meter.shutdown()),
            ("logger", self.logger.shutdown()),
        ];

        for (provider, result) in results {
            if let Err(error) = result {
                tracing::warn!(
                    target: TRACING_TARGET_TELEMETRY,
                    provider,
                    error = %error,
                    "telemetry provider shutdown failed"
                );
            }
        }
    }
}

/// Flushes and shuts down the OpenTelemetry providers when dropped.
#[must_use = "telemetry is shut down as soon as the guard is dropped"]
pub struct TelemetryGuard {
    providers: Option<Providers>,
}

impl TelemetryGuard {
    /// Whether OTLP export is active.
    pub fn is_exporting(&self) -> bool {
        self.providers.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(providers) = self.providers.take() {
            tracing::debug!(target: TRACING_TARGET_TELEMETRY, "flushing telemetry");
            providers.shutdown();
        }
    }
}

/// Installs the global log subscriber and, when enabled, the OTLP providers.
///
/// # Errors
///
/// Fails if an exporter cannot be built or a subscriber is already set.
pub fn init(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let providers = config
        .enabled
        .then(|| Providers::install(config))
        .transpose()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let pretty = (config.log_format == LogFormat::Pretty).then(tracing_subscriber::fmt::layer);
    let json = (config.log_format == LogFormat::Json)
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let bridge = providers.as_ref().map(|providers| {
        OpenTelemetryTracingBridge::new(&providers.logger).with_filter(filter_fn(is_exportable))
    });
    let spans = providers.as_ref().map(|providers| {
        let tracer = providers.tracer.tracer(config.service_name.clone());
        tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(filter_fn(is_exportable))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(spans)
        .with(bridge)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(TelemetryGuard { providers })
}

fn is_exportable(metadata: &Metadata<'_>) -> bool {
    let target = metadata.target();
    !EXCLUDED_LOG_TARGETS
        .iter()
        .any(|excluded| target.starts_with(excluded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exporter_http_stack_is_excluded() {
        let excluded = ["hyper::client::connect", "opentelemetry_sdk", "reqwest::connect"];
        for target in excluded {
            assert!(
                EXCLUDED_LOG_TARGETS
                    .iter()
                    .any(|prefix| target.starts_with(prefix)),
                "{target}"
            );
        }
        assert!(
            !EXCLUDED_LOG_TARGETS
                .iter()
                .any(|prefix| "stowage_storage::telemetry".starts_with(prefix))
        );
    }
}
