//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_cache_error, record_cache_request,
    record_event_published, record_http_request, record_rate_limited, record_store_query,
    PrometheusMetrics,
};
