//! Request ids, header redaction, and request spans.
//!
//! Every request gets an `info` span named after its route template. The
//! `otel.*` fields follow the `tracing-opentelemetry` conventions, so with
//! that layer installed the span is exported as a server span and the
//! storage spans opened by the handler nest under it.

use std::time::Duration;

use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::http::HeaderName;
use axum::http::header;
use axum::response::Response;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;
use tracing::field::Empty;

use super::TRACING_TARGET_HTTP;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub(super) fn layer<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let trace = TraceLayer::new_for_http()
        .make_span_with(request_span)
        .on_response(record_response);

    router
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(SetSensitiveRequestHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        .layer(trace)
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
}

fn request_span(request: &Request) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str);
    let name = format!("{} {route}", request.method());
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        target: TRACING_TARGET_HTTP,
        "request",
        otel.name = name.as_str(),
        otel.kind = "server",
        otel.status_code = Empty,
        http.request.method = %request.method(),
        http.route = route,
        url.path = request.uri().path(),
        request_id,
        http.response.status_code = Empty,
    )
}

fn record_response(response: &Response, latency: Duration, span: &Span) {
    let status = response.status();
    span.record("http.response.status_code", status.as_u16());
    if status.is_server_error() {
        span.record("otel.status_code", "ERROR");
    }

    tracing::debug!(
        target: TRACING_TARGET_HTTP,
        status = status.as_u16(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        "response sent"
    );
}

#[cfg(test)]
mod test {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use bytes::Bytes;
    use opentelemetry::global::{self, BoxedTracer};
    use opentelemetry::trace::{SpanKind, TracerProvider};
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
    use stowage_object::MemoryProvider;
    use stowage_storage::StorageTelemetry;
    use tracing_subscriber::layer::SubscriberExt;

    use crate::handler::test::{create_test_server, create_test_server_with};

    #[tokio::test]
    async fn responses_carry_request_id() -> anyhow::Result<()> {
        let server = create_test_server()?;

        let response = server.get("/").await;
        assert!(response.headers().contains_key("x-request-id"));

        let response = server
            .get("/")
            .add_header(
                HeaderName::from_static("x-request-id"),
                HeaderValue::from_static("req-42"),
            )
            .await;
        response.assert_header("x-request-id", "req-42");
        Ok(())
    }

    fn find<'a>(spans: &'a [SpanData], name: &str) -> &'a SpanData {
        spans
            .iter()
            .find(|span| span.name == name)
            .unwrap_or_else(|| panic!("no span named {name}"))
    }

    #[tokio::test]
    async fn request_storage_and_store_spans_form_one_trace() -> anyhow::Result<()> {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("http")));
        let _default = tracing::subscriber::set_default(subscriber);

        let telemetry = StorageTelemetry::new(
            BoxedTracer::new(Box::new(provider.tracer("storage"))),
            &global::meter("stowage-test"),
        );
        let server = create_test_server_with(MemoryProvider::new(), telemetry)?;

        server
            .post("/upload/reports/q3.csv")
            .bytes(Bytes::from_static(b"a,b"))
            .await
            .assert_status(StatusCode::CREATED);
        provider.force_flush()?;

        let spans = exporter.get_finished_spans()?;
        let request = find(&spans, "POST /upload/{*key}");
        let upload = find(&spans, "upload demo");
        let head = find(&spans, "object.head");
        let create = find(&spans, "object.create_multipart");

        assert_eq!(request.span_kind, SpanKind::Server);
        assert_eq!(upload.span_kind, SpanKind::Client);
        assert_eq!(upload.parent_span_id, request.span_context.span_id());
        assert_eq!(head.parent_span_id, upload.span_context.span_id());
        assert_eq!(create.parent_span_id, upload.span_context.span_id());

        let trace_id = request.span_context.trace_id();
        assert!(
            [upload, head, create]
                .iter()
                .all(|span| span.span_context.trace_id() == trace_id)
        );
        Ok(())
    }
}
