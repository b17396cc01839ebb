//! In-memory OpenTelemetry pipeline and log capture for asserting on
//! emitted signals.

use std::fmt;
use std::sync::{Arc, Mutex};

use opentelemetry::global::BoxedTracer;
use opentelemetry::metrics::MeterProvider;
use opentelemetry::trace::{SpanId, TraceContextExt, TracerProvider};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{self, Layer, SubscriberExt};

use super::StorageTelemetry;
use crate::TRACING_TARGET_OPERATIONS;
use crate::conventions::{OPERATION_ACTIVE, OPERATION_DURATION};

/// One exported data point: the value and its attribute set.
#[derive(Debug, Clone)]
pub(crate) struct Point<T> {
    pub value: T,
    pub attributes: Vec<KeyValue>,
}

impl<T> Point<T> {
    pub fn attribute(&self, key: &str) -> Option<Value> {
        attribute(&self.attributes, key)
    }
}

pub(crate) fn attribute(attributes: &[KeyValue], key: &str) -> Option<Value> {
    attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub(crate) struct Harness {
    spans: InMemorySpanExporter,
    metrics: InMemoryMetricExporter,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Harness {
    pub fn new() -> Self {
        let spans = InMemorySpanExporter::default();
        let tracer_provider = SdkTracerProvider::builder()
            .with_simple_exporter(spans.clone())
            .build();

        let metrics = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(metrics.clone()).build();
        let meter_provider = SdkMeterProvider::builder().with_reader(reader).build();

        Self {
            spans,
            metrics,
            tracer_provider,
            meter_provider,
        }
    }

    pub fn telemetry(&self) -> StorageTelemetry {
        let tracer = BoxedTracer::new(Box::new(self.tracer_provider.tracer("stowage-test")));
        StorageTelemetry::new(tracer, &self.meter_provider.meter("stowage-test"))
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    /// Sample count per attribute set of the duration histogram.
    pub fn durations(&self) -> Vec<Point<u64>> {
        let mut points = Vec::new();
        self.visit(OPERATION_DURATION, |data| {
            if let AggregatedMetrics::F64(MetricData::Histogram(histogram)) = data {
                for dp in histogram.data_points() {
                    points.push(Point {
                        value: dp.count(),
                        attributes: dp.attributes().cloned().collect(),
                    });
                }
            }
        });
        points
    }

    /// Current value per attribute set of the active-operation counter.
    pub fn active(&self) -> Vec<Point<i64>> {
        let mut points = Vec::new();
        self.visit(OPERATION_ACTIVE, |data| {
            if let AggregatedMetrics::I64(MetricData::Sum(sum)) = data {
                for dp in sum.data_points() {
                    points.push(Point {
                        value: dp.value(),
                        attributes: dp.attributes().cloned().collect(),
                    });
                }
            }
        });
        points
    }

    /// Sum of the active-operation counter over every attribute set.
    pub fn active_total(&self) -> i64 {
        self.active().iter().map(|p| p.value).sum()
    }

    /// Visit the data of `name` in the most recent cumulative export.
    fn visit(&self, name: &str, mut f: impl FnMut(&AggregatedMetrics)) {
        self.metrics.reset();
        self.meter_provider.force_flush().unwrap();
        let exported = self.metrics.get_finished_metrics().unwrap();
        let Some(latest) = exported.last() else {
            return;
        };
        for scope in latest.scope_metrics() {
            for metric in scope.metrics().filter(|m| m.name() == name) {
                f(metric.data());
            }
        }
    }
}

/// A log event emitted by the operation pipeline.
#[derive(Debug, Clone)]
pub(crate) struct CapturedEvent {
    pub level: Level,
    pub message: String,
    /// Span of the OpenTelemetry context current when the event fired.
    pub span_id: Option<SpanId>,
}

/// Records the events of [`TRACING_TARGET_OPERATIONS`].
#[derive(Clone, Default)]
pub(crate) struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    /// Install the capture as the subscriber of the current thread.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == Level::WARN)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: layer::Context<'_, S>) {
        if event.metadata().target() != TRACING_TARGET_OPERATIONS {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let cx = Context::current();
        let span_id = cx
            .has_active_span()
            .then(|| cx.span().span_context().span_id());

        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.0,
            span_id,
        });
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}
