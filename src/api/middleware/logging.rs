//! Request completion logging

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use super::route_label;

pub const X_RESPONSE_TIME: &str = "x-response-time";

/// Logs one line per completed request and reports the handling time in `X-Response-Time`
///
/// Runs inside `TraceLayer`'s span, so it does not open a span of its own. The request id
/// is the `x-request-id` header set by the request-id layer.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = route_label(&request);
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let mut response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let duration_ms = elapsed.as_millis() as u64;

    let response_time = format!("{:.2}ms", elapsed.as_secs_f64() * 1000.0);
    if let Ok(value) = HeaderValue::from_str(&response_time) {
        response.headers_mut().insert(X_RESPONSE_TIME, value);
    }

    if status.is_server_error() {
        warn!(
            method = %method,
            path = %route,
            status = status.as_u16(),
            duration_ms,
            request_id = %request_id,
            "Request failed"
        );
    } else {
        info!(
            method = %method,
            path = %route,
            status = status.as_u16(),
            duration_ms,
            request_id = %request_id,
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_response_time_header() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(logging_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let value = response.headers()[X_RESPONSE_TIME].to_str().unwrap();
        let millis = value.strip_suffix("ms").unwrap();
        assert!(millis.parse::<f64>().unwrap() >= 0.0);
        assert_eq!(millis.split('.').nth(1).map(str::len), Some(2));
    }
}
