use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::{middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::{
    logging_middleware, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    RateLimiter, SecurityHeaders, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
    X_RESPONSE_TIME,
};
use super::state::AppState;
use super::v1;
use super::ws;
use crate::config::{RateLimitConfig, ServerConfig};

/// Create a minimal router without state (for testing/backward compatibility)
/// Note: /ready endpoint is not available without state
pub fn create_router() -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .layer(TraceLayer::new_for_http())
}

/// Create the full router with application state
///
/// Layers, outermost first: CORS, request id, tracing, security headers, request logging,
/// metrics, rate limiting.
pub fn create_router_with_state(
    state: AppState,
    server: &ServerConfig,
    rate_limit: &RateLimitConfig,
) -> Router {
    let router = Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Live change events
        .route("/ws", get(ws::ws_handler))
        .route("/ws/stats", get(ws::ws_stats))
        .nest("/v1", v1::create_v1_router())
        .with_state(state);

    let router = if rate_limit.enabled {
        let limiter = Arc::new(RateLimiter::from_config(rate_limit));
        router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    } else {
        router
    };

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(
            SecurityHeaders { hsts: server.hsts },
            security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&server.cors_origins))
}

/// Any origin when the list is empty or contains `*`
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(X_RESPONSE_TIME),
            HeaderName::from_static(X_RATELIMIT_LIMIT),
            HeaderName::from_static(X_RATELIMIT_REMAINING),
            HeaderName::from_static(X_RATELIMIT_RESET),
        ]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::domain::cache::MockCache;
    use crate::infrastructure::events::BroadcastNotifier;
    use crate::infrastructure::services::{PoiService, ResultCache};
    use crate::infrastructure::storage::InMemoryPoiRepository;

    fn app_with_cache(cache: Arc<MockCache>) -> Router {
        app_with(cache, &RateLimitConfig::default())
    }

    fn app_with(cache: Arc<MockCache>, rate_limit: &RateLimitConfig) -> Router {
        let notifier = Arc::new(BroadcastNotifier::default());
        let service = PoiService::new(
            Arc::new(InMemoryPoiRepository::new()),
            ResultCache::new(cache),
            notifier.clone(),
        );

        create_router_with_state(
            AppState::new(Arc::new(service), notifier, 1000.0),
            &ServerConfig::default(),
            rate_limit,
        )
    }

    fn app() -> Router {
        app_with_cache(Arc::new(MockCache::new()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = app();

        let health = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let ready = app.oneshot(get("/ready")).await.unwrap();
        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(body_json(ready).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_degraded_when_cache_down() {
        let app = app_with_cache(Arc::new(MockCache::new().with_error("redis down")));

        let ready = app.oneshot(get("/ready")).await.unwrap();
        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(body_json(ready).await["status"], "degraded");
    }

    #[tokio::test]
    async fn test_create_then_search_flow() {
        let app = app();

        let created = app
            .clone()
            .oneshot(post_json(
                "/v1/pois",
                serde_json::json!({
                    "name": "Test Cafe",
                    "category": "cafe",
                    "lat": 29.7604,
                    "lon": -95.3698
                }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = body_json(created).await["id"].as_i64().unwrap();

        let uri = "/v1/nearby?lat=29.7604&lon=-95.3698&radius_m=1000";
        let first = body_json(app.clone().oneshot(get(uri)).await.unwrap()).await;
        assert_eq!(first["cached"], false);
        assert_eq!(first["items"][0]["id"], id);

        let second = body_json(app.clone().oneshot(get(uri)).await.unwrap()).await;
        assert_eq!(second["cached"], true);

        let fetched = app
            .oneshot(get(&format!("/v1/pois/{}", id)))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_inverted_bbox_is_bad_request() {
        let response = app()
            .oneshot(get(
                "/v1/bbox?min_lat=30&min_lon=-96&max_lat=29&max_lon=-95",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_nearby_limit_out_of_range() {
        let response = app()
            .oneshot(get("/v1/nearby?lat=0&lon=0&limit=500"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["param"], "limit");
    }

    #[tokio::test]
    async fn test_missing_poi_is_not_found() {
        let response = app().oneshot(get("/v1/pois/4242")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/pois")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\":"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "json_parse_error");
    }

    #[tokio::test]
    async fn test_categories_and_stats() {
        let app = app();

        let bulk = app
            .clone()
            .oneshot(post_json(
                "/v1/pois/bulk",
                serde_json::json!({
                    "pois": [
                        {"name": "A", "category": "park", "lat": 1.0, "lon": 1.0},
                        {"name": "B", "category": "park", "lat": 2.0, "lon": 2.0}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(bulk.status(), StatusCode::CREATED);
        assert_eq!(body_json(bulk).await["inserted"], 2);

        let categories = body_json(app.clone().oneshot(get("/v1/categories")).await.unwrap()).await;
        assert_eq!(categories["total"], 1);
        assert_eq!(categories["categories"][0]["name"], "park");
        assert_eq!(categories["categories"][0]["count"], 2);

        let stats = body_json(app.clone().oneshot(get("/v1/stats")).await.unwrap()).await;
        assert_eq!(stats["total_pois"], 2);

        let cache = body_json(app.oneshot(get("/v1/cache/stats")).await.unwrap()).await;
        assert_eq!(cache["cache"]["enabled"], true);
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = app().oneshot(get("/health")).await.unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }

    fn limited_app(requests: u32) -> Router {
        app_with(
            Arc::new(MockCache::new()),
            &RateLimitConfig {
                enabled: true,
                requests,
                window_secs: 60,
            },
        )
    }

    fn get_from(uri: &str, client: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", client)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_after_quota() {
        let app = limited_app(2);
        let uri = "/v1/nearby?lat=0&lon=0";

        let first = app.clone().oneshot(get_from(uri, "198.51.100.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[X_RATELIMIT_LIMIT], "2");
        assert_eq!(first.headers()[X_RATELIMIT_REMAINING], "1");
        assert!(first.headers().contains_key(X_RATELIMIT_RESET));

        let second = app.clone().oneshot(get_from(uri, "198.51.100.1")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()[X_RATELIMIT_REMAINING], "0");

        let third = app.clone().oneshot(get_from(uri, "198.51.100.1")).await.unwrap();
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(third.headers().contains_key("retry-after"));
        assert_eq!(third.headers()["x-content-type-options"], "nosniff");
        let body = body_json(third).await;
        assert_eq!(body["error"]["type"], "rate_limit_error");
        assert_eq!(body["error"]["code"], "rate_limit_exceeded");

        let other = app.oneshot(get_from(uri, "198.51.100.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoints_skip_rate_limit() {
        let app = limited_app(1);

        for _ in 0..3 {
            for path in ["/health", "/live", "/ready"] {
                let response = app.clone().oneshot(get_from(path, "198.51.100.9")).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK, "{}", path);
                assert!(!response.headers().contains_key(X_RATELIMIT_LIMIT));
            }
        }
    }

    #[tokio::test]
    async fn test_disabled_rate_limit_adds_no_headers() {
        let app = app_with(
            Arc::new(MockCache::new()),
            &RateLimitConfig {
                enabled: false,
                requests: 1,
                window_secs: 60,
            },
        );

        for _ in 0..3 {
            let response = app.clone().oneshot(get("/v1/categories")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response.headers().contains_key(X_RATELIMIT_LIMIT));
        }
    }

    #[tokio::test]
    async fn test_security_and_timing_headers() {
        let response = app().oneshot(get("/v1/categories")).await.unwrap();
        let headers = response.headers();

        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert!(!headers.contains_key("strict-transport-security"));
        assert!(headers[X_RESPONSE_TIME].to_str().unwrap().ends_with("ms"));
    }

    #[test]
    fn test_cors_layer_accepts_origin_list() {
        let _ = cors_layer(&["https://maps.example.com".to_string()]);
        let _ = cors_layer(&[]);
    }
}
