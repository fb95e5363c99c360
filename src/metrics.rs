//! Prometheus metrics for Folio.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a middleware for HTTP RED
//! metrics, and exposes the `/metrics` endpoint handler.  Media and
//! document operations are counted from the services.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "folio_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "folio_http_request_duration_seconds";

/// Media store operations (counter). Labels: operation, status.
pub const MEDIA_OPERATIONS_TOTAL: &str = "folio_media_operations_total";

/// Bytes written to the media store (counter).
pub const MEDIA_BYTES_WRITTEN_TOTAL: &str = "folio_media_bytes_written_total";

/// Metadata store operations (counter). Labels: operation, collection, status.
pub const DOCUMENT_OPERATIONS_TOTAL: &str = "folio_document_operations_total";

/// Media objects removed by the reconciler (counter).
pub const RECONCILE_REMOVED_TOTAL: &str = "folio_reconcile_removed_total";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(MEDIA_OPERATIONS_TOTAL, "Media store operations by type");
    describe_counter!(MEDIA_BYTES_WRITTEN_TOTAL, "Bytes written to the media store");
    describe_counter!(
        DOCUMENT_OPERATIONS_TOTAL,
        "Metadata store operations by type and collection"
    );
    describe_counter!(
        RECONCILE_REMOVED_TOTAL,
        "Unreferenced media objects removed by the reconciler"
    );
}

// -- Operation counters -------------------------------------------------------

fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "error"
    }
}

/// Count one media store call.
pub fn record_media_op<T, E>(operation: &'static str, result: &Result<T, E>) {
    counter!(MEDIA_OPERATIONS_TOTAL, "operation" => operation, "status" => outcome(result))
        .increment(1);
}

/// Count one metadata store call.
pub fn record_document_op<T, E>(
    operation: &'static str,
    collection: &'static str,
    result: &Result<T, E>,
) {
    counter!(
        DOCUMENT_OPERATIONS_TOTAL,
        "operation" => operation,
        "collection" => collection,
        "status" => outcome(result)
    )
    .increment(1);
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Normalize a request path to its route template so ids and slugs do not
/// become label values.
///
/// Examples:
/// - `/blog/hello-world` -> `/blog/{id}`
/// - `/blog/publish/42` -> `/blog/publish/{id}`
/// - `/users/updateprofile` -> `/users/updateprofile`
/// - `/nope/a/b/c` -> `/{other}`
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let template = match segments.as_slice() {
        [] => "/",
        ["health"] => "/health",
        ["metrics"] => "/metrics",
        ["openapi.json"] => "/openapi.json",
        ["login"] => "/login",
        ["blog"] => "/blog",
        ["blog", "updatethumbnail", _] => "/blog/updatethumbnail/{id}",
        ["blog", "publish", _] => "/blog/publish/{id}",
        ["blog", _] => "/blog/{id}",
        ["users"] => "/users",
        ["users", "updateprofile"] => "/users/updateprofile",
        ["users", "edit", _] => "/users/edit/{id}",
        ["users", _] => "/users/{id}",
        _ => "/{other}",
    };
    template.to_string()
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> impl IntoResponse {
    let body = PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_fixed_routes() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/login"), "/login");
        assert_eq!(normalize_path("/blog"), "/blog");
        assert_eq!(normalize_path("/users/"), "/users");
    }

    #[test]
    fn test_normalize_path_blog() {
        assert_eq!(normalize_path("/blog/hello-world"), "/blog/{id}");
        assert_eq!(
            normalize_path("/blog/updatethumbnail/abc"),
            "/blog/updatethumbnail/{id}"
        );
        assert_eq!(normalize_path("/blog/publish/abc"), "/blog/publish/{id}");
    }

    #[test]
    fn test_normalize_path_users() {
        assert_eq!(normalize_path("/users/123"), "/users/{id}");
        assert_eq!(normalize_path("/users/edit/123"), "/users/edit/{id}");
        assert_eq!(
            normalize_path("/users/updateprofile"),
            "/users/updateprofile"
        );
    }

    #[test]
    fn test_normalize_path_unknown() {
        assert_eq!(normalize_path("/a/b/c/d"), "/{other}");
    }
}
