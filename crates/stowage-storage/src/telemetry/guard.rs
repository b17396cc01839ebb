//! Scoped emission of the signals of one storage call.

use std::time::Instant;

use opentelemetry::trace::{SpanKind, SpanRef, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use super::{StorageTelemetry, parent_context};
use crate::TRACING_TARGET_OPERATIONS;
use crate::conventions::{ERROR_TYPE, OperationName, STORAGE_OBJECT_KEY};
use crate::error::{ErrorKind, StorageError};

/// Owns the span context, the start instant, and the gauge increment of
/// one call.
///
/// Creating the guard increments `storage.client.operation.active` and
/// starts the span as a child of the caller's context. The operation body
/// must run under [`context`](Self::context) so that store calls and log
/// events made inside it are correlated with the span.
///
/// [`finish`](Self::finish) records the outcome. Dropping the guard always
/// decrements the gauge; if it is dropped before `finish`, the call counts
/// as cancelled and is recorded as [`ErrorKind::Unknown`].
#[must_use = "dropping the guard immediately records a cancelled operation"]
pub struct OperationGuard<'a> {
    telemetry: &'a StorageTelemetry,
    operation: OperationName,
    attributes: Vec<KeyValue>,
    cx: Option<Context>,
    started: Instant,
}

impl<'a> OperationGuard<'a> {
    pub(crate) fn start(
        telemetry: &'a StorageTelemetry,
        operation: OperationName,
        bucket: &str,
        key: &str,
        attributes: Vec<KeyValue>,
    ) -> Self {
        telemetry.active().add(1, &attributes);

        let mut span_attributes = attributes.clone();
        span_attributes.push(KeyValue::new(STORAGE_OBJECT_KEY, key.to_owned()));
        let parent = parent_context();
        let span = telemetry
            .tracer()
            .span_builder(format!("{operation} {bucket}"))
            .with_kind(SpanKind::Client)
            .with_attributes(span_attributes)
            .start_with_context(telemetry.tracer(), &parent);
        let cx = parent.with_span(span);

        {
            let _attached = cx.clone().attach();
            tracing::info!(
                target: TRACING_TARGET_OPERATIONS,
                bucket,
                key,
                operation = operation.as_str(),
                "{operation}.start"
            );
        }

        Self {
            telemetry,
            operation,
            attributes,
            cx: Some(cx),
            started: Instant::now(),
        }
    }

    /// Context carrying the operation span.
    pub(crate) fn context(&self) -> Context {
        self.cx.clone().unwrap_or_default()
    }

    /// Record the outcome of the call and end the span.
    pub(crate) fn finish<T>(mut self, result: &Result<T, StorageError>) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let Some(cx) = self.cx.take() else {
            return;
        };
        let _attached = cx.clone().attach();
        let span = cx.span();
        let operation = self.operation;

        match result {
            Ok(_) => {
                self.telemetry.duration().record(elapsed, &self.attributes);
                span.set_status(Status::Ok);
            }
            Err(error) => {
                let kind = error.kind();
                self.record_failure(&span, elapsed, kind, error.to_string());
                tracing::warn!(
                    target: TRACING_TARGET_OPERATIONS,
                    operation = operation.as_str(),
                    error_type = kind.as_str(),
                    error = %error,
                    "{operation}.failed"
                );
            }
        }
        span.end();

        tracing::info!(
            target: TRACING_TARGET_OPERATIONS,
            operation = operation.as_str(),
            duration_s = elapsed,
            "{operation}.end"
        );
    }

    fn record_failure(&self, span: &SpanRef<'_>, elapsed: f64, kind: ErrorKind, message: String) {
        let mut attributes = self.attributes.clone();
        attributes.push(KeyValue::new(ERROR_TYPE, kind.as_str()));
        self.telemetry.duration().record(elapsed, &attributes);

        span.set_attribute(KeyValue::new(ERROR_TYPE, kind.as_str()));
        span.set_status(Status::error(message));
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.telemetry.active().add(-1, &self.attributes);

        if let Some(cx) = self.cx.take() {
            let _attached = cx.clone().attach();
            let span = cx.span();
            let elapsed = self.started.elapsed().as_secs_f64();
            self.record_failure(
                &span,
                elapsed,
                ErrorKind::Unknown,
                "operation cancelled".to_owned(),
            );
            span.end();

            tracing::warn!(
                target: TRACING_TARGET_OPERATIONS,
                operation = self.operation.as_str(),
                error_type = ErrorKind::Unknown.as_str(),
                "{}.cancelled",
                self.operation
            );
        }
    }
}
