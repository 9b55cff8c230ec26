//! Prometheus metrics infrastructure
//!
//! Recording functions are safe to call before (or without) [`init_metrics`]; with no
//! recorder installed the `metrics` macros are no-ops.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
    path: String,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("path", &self.path)
            .finish()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("geosearch_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!(path = %config.route_path(), "Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
                path: config.route_path(),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    let path = metrics.path.clone();

    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric; `route` should be the matched route template
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", route.to_string()),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record a cache lookup; `kind` is the key prefix (`nearby`, `bbox`, `poi`, `categories`)
pub fn record_cache_request(kind: &str, hit: bool) {
    let labels = [
        ("kind", kind.to_string()),
        ("result", if hit { "hit" } else { "miss" }.to_string()),
    ];

    counter!("geosearch_cache_requests_total", &labels).increment(1);
}

/// Record a cache backend failure that was absorbed
pub fn record_cache_error(op: &str) {
    counter!("geosearch_cache_errors_total", "op" => op.to_string()).increment(1);
}

/// Record a published change event
pub fn record_event_published(channel: &str) {
    counter!("geosearch_events_published_total", "channel" => channel.to_string()).increment(1);
}

/// Record a request rejected by the rate limiter
pub fn record_rate_limited() {
    counter!("geosearch_rate_limited_total").increment(1);
}

/// Record a store round-trip
pub fn record_store_query(op: &str) {
    counter!("geosearch_store_queries_total", "op" => op.to_string()).increment(1);
}
