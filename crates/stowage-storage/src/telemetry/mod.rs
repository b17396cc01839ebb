//! OpenTelemetry instruments and per-operation emission.
//!
//! [`StorageTelemetry`] owns the tracer, the duration histogram, and the
//! active-operation counter. It is built once and handed to
//! [`Storage`](crate::Storage); the library never reaches for global
//! providers on its own. [`OperationGuard`] scopes the signals of a single
//! call.
//!
//! The operation span is parented on the caller's context: the OpenTelemetry
//! span behind the current `tracing` span when a `tracing-opentelemetry`
//! layer is installed, otherwise the attached OpenTelemetry context.

mod guard;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::metrics::{Histogram, Meter, UpDownCounter};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, KeyValue};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use url::Url;

pub use self::guard::OperationGuard;
use crate::ConfigError;
use crate::conventions::{
    DURATION_BOUNDARIES, INSTRUMENTATION_SCOPE, OPERATION_ACTIVE, OPERATION_ACTIVE_DESCRIPTION,
    OPERATION_ACTIVE_UNIT, OPERATION_DURATION, OPERATION_DURATION_DESCRIPTION,
    OPERATION_DURATION_UNIT, OperationName, SERVER_ADDRESS, SERVER_PORT, STORAGE_BUCKET,
    STORAGE_OPERATION_NAME,
};

/// Host and optional explicit port of the object store endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    /// Endpoint hostname.
    pub address: String,
    /// Port, only when the URL names one explicitly.
    pub port: Option<u16>,
}

impl ServerEndpoint {
    /// Parse the host and explicit port out of an endpoint URL.
    pub fn parse(endpoint: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            url: endpoint.to_owned(),
            reason,
        };
        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        let address = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_owned()))?;

        Ok(Self {
            address: address.to_owned(),
            port: url.port(),
        })
    }
}

/// Tracer and metric instruments shared by every storage operation.
#[derive(Clone)]
pub struct StorageTelemetry {
    tracer: Arc<BoxedTracer>,
    duration: Histogram<f64>,
    active: UpDownCounter<i64>,
}

impl StorageTelemetry {
    /// Build the instruments from `meter` and pair them with `tracer`.
    pub fn new(tracer: BoxedTracer, meter: &Meter) -> Self {
        let duration = meter
            .f64_histogram(OPERATION_DURATION)
            .with_description(OPERATION_DURATION_DESCRIPTION)
            .with_unit(OPERATION_DURATION_UNIT)
            .with_boundaries(DURATION_BOUNDARIES.to_vec())
            .build();
        let active = meter
            .i64_up_down_counter(OPERATION_ACTIVE)
            .with_description(OPERATION_ACTIVE_DESCRIPTION)
            .with_unit(OPERATION_ACTIVE_UNIT)
            .build();

        Self {
            tracer: Arc::new(tracer),
            duration,
            active,
        }
    }

    /// Build the instruments from the globally installed providers.
    ///
    /// Falls back to no-op instruments when no provider was installed.
    pub fn from_global() -> Self {
        Self::new(
            global::tracer(INSTRUMENTATION_SCOPE),
            &global::meter(INSTRUMENTATION_SCOPE),
        )
    }

    pub(crate) fn tracer(&self) -> &BoxedTracer {
        &self.tracer
    }

    pub(crate) fn duration(&self) -> &Histogram<f64> {
        &self.duration
    }

    pub(crate) fn active(&self) -> &UpDownCounter<i64> {
        &self.active
    }
}

impl std::fmt::Debug for StorageTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageTelemetry").finish_non_exhaustive()
    }
}

/// Context the operation span is started under.
pub(crate) fn parent_context() -> Context {
    let bridged = tracing::Span::current().context();
    if bridged.has_active_span() {
        bridged
    } else {
        Context::current()
    }
}

/// Attributes shared by the span and both metric instruments.
///
/// Absent endpoint parts are omitted rather than emitted empty.
pub(crate) fn common_attributes(
    bucket: &str,
    endpoint: Option<&ServerEndpoint>,
    operation: OperationName,
) -> Vec<KeyValue> {
    let mut attributes = Vec::with_capacity(4);
    if let Some(endpoint) = endpoint {
        attributes.push(KeyValue::new(SERVER_ADDRESS, endpoint.address.clone()));
        if let Some(port) = endpoint.port {
            attributes.push(KeyValue::new(SERVER_PORT, i64::from(port)));
        }
    }
    attributes.push(KeyValue::new(STORAGE_BUCKET, bucket.to_owned()));
    attributes.push(KeyValue::new(STORAGE_OPERATION_NAME, operation.as_str()));
    attributes
}

#[cfg(test)]
mod tests {
    use opentelemetry::Value;

    use super::*;

    #[test]
    fn endpoint_with_explicit_port() {
        let endpoint = ServerEndpoint::parse("http://localhost:9000").unwrap();
        assert_eq!(endpoint.address, "localhost");
        assert_eq!(endpoint.port, Some(9000));
    }

    #[test]
    fn endpoint_without_port() {
        let endpoint = ServerEndpoint::parse("https://s3.us-east-1.amazonaws.com").unwrap();
        assert_eq!(endpoint.address, "s3.us-east-1.amazonaws.com");
        assert_eq!(endpoint.port, None);
    }

    #[test]
    fn endpoint_without_host() {
        let err = ServerEndpoint::parse("not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn attributes_omit_absent_endpoint() {
        let attributes = common_attributes("demo", None, OperationName::Download);
        let keys: Vec<_> = attributes.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, [STORAGE_BUCKET, STORAGE_OPERATION_NAME]);
    }

    #[test]
    fn attributes_include_endpoint() {
        let endpoint = ServerEndpoint {
            address: "minio".into(),
            port: Some(9000),
        };
        let attributes = common_attributes("demo", Some(&endpoint), OperationName::Upload);
        assert_eq!(attributes.len(), 4);
        assert!(
            attributes
                .iter()
                .any(|kv| kv.key.as_str() == SERVER_PORT && kv.value == Value::I64(9000))
        );
        assert!(attributes.iter().any(
            |kv| kv.key.as_str() == STORAGE_OPERATION_NAME && kv.value.as_str() == "upload"
        ));
    }
}
