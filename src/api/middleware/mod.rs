//! API middleware components

pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod security;

use axum::{body::Body, extract::MatchedPath, http::Request};

pub use logging::{logging_middleware, X_RESPONSE_TIME};
pub use metrics::metrics_middleware;
pub use rate_limit::{
    rate_limit_middleware, RateLimitDecision, RateLimiter, X_RATELIMIT_LIMIT,
    X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use security::{security_headers_middleware, SecurityHeaders};

/// Matched route template (e.g. `/v1/pois/{poi_id}`), keeping metric label cardinality bounded
pub(crate) fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label_without_match() {
        let request = Request::builder()
            .uri("/v1/pois/123")
            .body(Body::empty())
            .unwrap();

        assert_eq!(route_label(&request), "unmatched");
    }
}
