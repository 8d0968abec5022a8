//! Logs, traces and Prometheus metrics.
//!
//! OTLP export is optional; without an endpoint only the local `fmt` layer
//! is installed.
use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::IntoResponse;
use metrics::{Unit, gauge};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle,
};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::{Span, Status, Tracer};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::time::interval;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::time::{Duration, Instant};

use crate::config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const HTTP_REQUESTS: &str = "http_requests_total";
const HTTP_DURATION: &str = "http_requests_duration_seconds";

fn resource() -> Resource {
    Resource::builder().with_service_name("bazaar").build()
}

/// Providers to flush before exiting.
#[derive(Default)]
pub struct Guard {
    tracer: Option<SdkTracerProvider>,
    logger: Option<SdkLoggerProvider>,
}

impl Guard {
    /// Flush and stop OTLP exporters.
    pub fn shutdown(self) {
        if let Some(tracer) = self.tracer {
            if let Err(err) = tracer.shutdown() {
                tracing::warn!(error = %err, "tracer provider did not shut down");
            }
        }
        if let Some(logger) = self.logger {
            if let Err(err) = logger.shutdown() {
                tracing::warn!(error = %err, "logger provider did not shut down");
            }
        }
    }
}

/// Install the global `tracing` subscriber, with OTLP export when configured.
pub fn init(config: &config::Telemetry) -> Result<Guard, BoxError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut guard = Guard::default();
    let bridge = match &config.otlp_endpoint {
        Some(endpoint) => {
            let tracer = setup_tracer(endpoint)?;
            global::set_tracer_provider(tracer.clone());
            guard.tracer = Some(tracer);

            let logger = setup_logger(endpoint)?;
            let bridge = OpenTelemetryTracingBridge::new(&logger);
            guard.logger = Some(logger);
            Some(bridge)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(bridge)
        .try_init()?;

    Ok(guard)
}

/// Create tracer for OLTP.
pub fn setup_tracer(endpoint: &str) -> Result<SdkTracerProvider, BoxError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource())
        .build())
}

/// Create OLTP exporter for logs.
pub fn setup_logger(endpoint: &str) -> Result<SdkLoggerProvider, BoxError> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

/// Create recorder for Prometheus metrics.
///
/// Also starts refreshing the process CPU and memory gauges.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const LATENCY_BUCKETS: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    metrics::describe_counter!(
        HTTP_REQUESTS,
        Unit::Count,
        "Requests served, by route and status."
    );
    metrics::describe_histogram!(
        HTTP_DURATION,
        Unit::Seconds,
        "Time spent answering a request."
    );
    metrics::describe_counter!(
        "store_divergence_total",
        Unit::Count,
        "Account writes that left relational and document stores out of sync."
    );

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_DURATION.to_owned()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;

    spawn_process_gauges();

    Ok(handle)
}

/// Refresh CPU and memory usage of this process every 10 seconds.
fn spawn_process_gauges() {
    metrics::describe_gauge!(
        "process_cpu_usage",
        Unit::Percent,
        "CPU usage of the process in percentage."
    );
    metrics::describe_gauge!(
        "process_memory_used_bytes",
        Unit::Bytes,
        "Total process memory in bytes."
    );

    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new_with_specifics(RefreshKind::nothing());
    let mut ticker = interval(Duration::from_secs(10));

    tokio::spawn(async move {
        loop {
            ticker.tick().await;

            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_memory().with_cpu(),
            );

            let Some(process) = system.process(pid) else {
                continue;
            };
            gauge!("process_memory_used_bytes").set(process.memory() as f64);
            gauge!("process_cpu_usage").set(process.cpu_usage() as f64);
        }
    });
}

/// Count, time and trace every routed request.
pub async fn track(req: Request, next: Next) -> impl IntoResponse {
    // unmatched requests are grouped to keep label cardinality bounded.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();
    let protocol = format!("{:?}", req.version());

    let mut span = global::tracer("bazaar-http")
        .start(format!("{method} {route}"));
    let start = Instant::now();

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status();

    span.set_attributes([
        KeyValue::new("http.request.method", method.clone()),
        KeyValue::new("http.route", route.clone()),
        KeyValue::new("http.response.status_code", i64::from(status.as_u16())),
        KeyValue::new("network.protocol.version", protocol),
    ]);
    if status.is_server_error() {
        span.set_status(Status::error(status.to_string()));
    }
    span.end();

    let labels = [
        ("method", method),
        ("route", route),
        ("status", status.as_u16().to_string()),
    ];
    metrics::counter!(HTTP_REQUESTS, &labels).increment(1);
    metrics::histogram!(HTTP_DURATION, &labels).record(latency);

    response
}
