//! Per-client request rate limiting
//!
//! Sliding window keyed by client address. Counters are held in this process only, so
//! every instance behind a load balancer enforces the limit on its own.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::api::types::ApiError;
use crate::config::RateLimitConfig;
use crate::infrastructure::observability::record_rate_limited;

/// Paths never counted against a client
pub const EXEMPT_PATHS: &[&str] = &["/health", "/live", "/ready"];

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Seconds until the oldest counted request leaves the window
    pub reset_in_secs: u64,
}

/// Sliding window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    records: RwLock<HashMap<String, VecDeque<Instant>>>,
    cleanup_interval: Duration,
    last_cleanup: RwLock<Instant>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            records: RwLock::new(HashMap::new()),
            cleanup_interval: Duration::from_secs(300),
            last_cleanup: RwLock::new(Instant::now()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests, config.window())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a request for `client` if it fits in the window
    pub async fn check_and_record(&self, client: &str) -> RateLimitDecision {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let mut records = self.records.write().await;
        let timestamps = records.entry(client.to_string()).or_default();

        while timestamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            timestamps.pop_front();
        }

        let allowed = (timestamps.len() as u64) < u64::from(self.limit);
        if allowed {
            timestamps.push_back(now);
        }

        let used = u32::try_from(timestamps.len()).unwrap_or(u32::MAX);
        let reset_in = timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.window);

        RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            reset_in_secs: ceil_secs(reset_in),
        }
    }

    /// Forget a client's history
    pub async fn reset(&self, client: &str) {
        self.records.write().await.remove(client);
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.records.read().await.len()
    }

    async fn maybe_cleanup(&self) {
        let now = Instant::now();
        {
            let last = self.last_cleanup.read().await;
            if now.duration_since(*last) < self.cleanup_interval {
                return;
            }
        }

        *self.last_cleanup.write().await = now;

        let window = self.window;
        self.records.write().await.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|t| now.duration_since(*t) < window)
        });
    }

    #[cfg(test)]
    fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// First `X-Forwarded-For` entry, then the peer address, then `unknown`
pub fn client_id(request: &Request<Body>) -> String {
    if let Some(forwarded) = forwarded_for(request.headers()) {
        return forwarded;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|part| !part.is_empty())
        .map(str::to_string)
}

fn insert_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let reset_at = chrono::Utc::now().timestamp()
        + i64::try_from(decision.reset_in_secs).unwrap_or(i64::MAX / 2);

    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_at));
}

/// Rejects clients over the limit with 429 and annotates allowed responses
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let client = client_id(&request);
    let decision = limiter.check_and_record(&client).await;

    if !decision.allowed {
        warn!(
            client = %client,
            limit = decision.limit,
            retry_after_secs = decision.reset_in_secs,
            "Rate limit exceeded"
        );
        record_rate_limited();

        let mut response = ApiError::rate_limited(format!(
            "Rate limit exceeded. Try again in {} seconds.",
            decision.reset_in_secs
        ))
        .into_response();
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.reset_in_secs));
        insert_limit_headers(headers, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    insert_limit_headers(response.headers_mut(), &decision);
    response
}
