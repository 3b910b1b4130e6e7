//! Prometheus metrics: HTTP middleware, business counters and the exporter.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Records `http_requests_total{method,path,status}` and
/// `http_request_duration_seconds{method,path}`.
///
/// `path` is the matched route template so ids do not explode cardinality.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// One download decision. `outcome` is `allowed`, `denied` or `error`.
pub fn record_download(platform: &str, outcome: &'static str) {
    counter!(
        "downloads_total",
        "platform" => platform.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// An order reached `paid`. `source` is `callback` or `manual`.
pub fn record_order_paid(source: &'static str) {
    counter!("orders_paid_total", "source" => source).increment(1);
}

/// A commission detail was written for a referrer.
pub fn record_commission_emitted(credit_to: &'static str) {
    counter!("commission_emitted_total", "credit_to" => credit_to).increment(1);
}

pub fn record_withdrawal_requested(method: &'static str) {
    counter!("withdrawals_requested_total", "method" => method).increment(1);
}

/// Login attempts by namespace (`web`, `project`) and outcome.
pub fn record_login(namespace: &'static str, outcome: &'static str) {
    counter!("logins_total", "namespace" => namespace, "outcome" => outcome).increment(1);
}

/// Rows touched by a scheduled job run.
pub fn record_job_rows(job: &'static str, rows: u64) {
    counter!("job_rows_affected_total", "job" => job).increment(rows);
}

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            [(axum::http::header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Installs the global Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}
