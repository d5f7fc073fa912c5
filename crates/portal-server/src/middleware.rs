//! Request middleware: per-IP rate limiting

use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Fixed-window rate limiter, tracked per client IP.
#[derive(Debug)]
pub struct RateLimiter {
    /// ip -> (request count, window start)
    requests: DashMap<String, (u32, Instant)>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            requests: DashMap::new(),
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check if a request is allowed and update the counter.
    /// Returns (allowed, remaining, reset_after_secs).
    pub fn check_request(&self, ip: &str) -> (bool, u32, u64) {
        let now = Instant::now();

        let mut entry = self.requests.entry(ip.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) >= self.window {
            *count = 0;
            *window_start = now;
        }

        let remaining = self.limit.saturating_sub(*count);
        let reset_after = self
            .window
            .checked_sub(now.duration_since(*window_start))
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if *count >= self.limit {
            return (false, 0, reset_after);
        }

        *count += 1;
        (true, remaining.saturating_sub(1), reset_after)
    }

    /// Drop stale windows. Called opportunistically from the middleware.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.requests
            .retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
    }
}

/// Extract the client IP, preferring proxy headers.
fn client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip) = value.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.trim().to_string();
        }
    }
    addr.ip().to_string()
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = client_ip(&headers, &addr);
    let (allowed, remaining, reset_after) = state.rate_limiter.check_request(&ip);

    if !allowed {
        warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");

        let mut response = crate::error::ApiError::RateLimited.into_response();
        let headers = response.headers_mut();
        headers.insert(
            "X-RateLimit-Limit",
            HeaderValue::from(state.rate_limiter.limit()),
        );
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u32));
        headers.insert("Retry-After", HeaderValue::from(reset_after));
        return Err(response);
    }

    state.rate_limiter.cleanup();

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(state.rate_limiter.limit()),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check_request("127.0.0.1").0);
        assert!(limiter.check_request("127.0.0.1").0);
        assert!(limiter.check_request("127.0.0.1").0);

        let (allowed, remaining, _) = limiter.check_request("127.0.0.1");
        assert!(!allowed);
        assert_eq!(remaining, 0);

        // A different client has its own window
        assert!(limiter.check_request("192.168.1.1").0);
    }

    #[test]
    fn test_rate_limiter_remaining_counts_down() {
        let limiter = RateLimiter::new(2, 60);
        let (_, remaining, _) = limiter.check_request("10.0.0.1");
        assert_eq!(remaining, 1);
        let (_, remaining, _) = limiter.check_request("10.0.0.1");
        assert_eq!(remaining, 0);
    }
}
