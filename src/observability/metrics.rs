//! OpenTelemetry metrics.
//!
//! Key metrics:
//! - courseload_store_operations_total: Counter of queued operations by outcome
//! - courseload_store_operation_seconds: Histogram from submit to reply
//! - courseload_queue_timeouts_total: Counter of enqueue timeouts
//! - courseload_reconcile_inserted_total / _deleted_total: Reconciliation writes
//! - courseload_reconcile_insert_only: Gauge, 1 if the last pass fell back

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

use crate::sync::reconcile::{ReconcileMode, ReconcileReport};

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Courseload metrics registry.
#[derive(Debug)]
pub struct Metrics {
    pub operations_total: Counter<u64>,
    pub operation_latency: Histogram<f64>,
    pub queue_timeouts: Counter<u64>,
    pub reconcile_inserted: Counter<u64>,
    pub reconcile_deleted: Counter<u64>,
    /// 1 when the last pass ran insert-only, 0 otherwise.
    pub reconcile_insert_only: Gauge<i64>,
}

impl Metrics {
    fn new(meter: &Meter) -> Self {
        Self {
            operations_total: meter
                .u64_counter("courseload_store_operations_total")
                .with_description("Store operations submitted through the queue")
                .with_unit("1")
                .init(),
            operation_latency: meter
                .f64_histogram("courseload_store_operation_seconds")
                .with_description("Time from submit to reply, including queueing")
                .with_unit("s")
                .init(),
            queue_timeouts: meter
                .u64_counter("courseload_queue_timeouts_total")
                .with_description("Submissions rejected because the queue stayed full")
                .with_unit("1")
                .init(),
            reconcile_inserted: meter
                .u64_counter("courseload_reconcile_inserted_total")
                .with_description("Courses inserted by reconciliation")
                .with_unit("1")
                .init(),
            reconcile_deleted: meter
                .u64_counter("courseload_reconcile_deleted_total")
                .with_description("Courses deleted by reconciliation")
                .with_unit("1")
                .init(),
            reconcile_insert_only: meter
                .i64_gauge("courseload_reconcile_insert_only")
                .with_description("1 if the last reconciliation pass ran insert-only")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// Exports over OTLP when an endpoint is given, otherwise metrics are
/// recorded into a manual reader and never exported. Subsequent calls are
/// ignored.
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, metrics will not be exported");
                    install_manual_provider();
                }
            }
        } else {
            install_manual_provider();
        }

        let meter = global::meter("courseload");
        Metrics::new(&meter)
    });
}

fn install_manual_provider() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Record a completed submission. `outcome` is `ok`, `error` or `closed`.
pub fn record_operation(outcome: &'static str, latency_seconds: f64) {
    if let Some(m) = METRICS.get() {
        let attrs = [KeyValue::new("outcome", outcome)];
        m.operations_total.add(1, &attrs);
        m.operation_latency.record(latency_seconds, &attrs);
    }
}

/// Record a submission that timed out waiting for a queue slot.
pub fn record_queue_timeout() {
    if let Some(m) = METRICS.get() {
        m.queue_timeouts.add(1, &[]);
    }
}

/// Record the writes made by a reconciliation pass.
pub fn record_reconcile(report: &ReconcileReport) {
    if let Some(m) = METRICS.get() {
        m.reconcile_inserted.add(report.inserted as u64, &[]);
        m.reconcile_deleted.add(report.deleted as u64, &[]);
        let insert_only = i64::from(report.mode == ReconcileMode::InsertOnly);
        m.reconcile_insert_only.record(insert_only, &[]);
    }
}
