use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::ApiError;
use crate::AppState;

pub const RATE_LIMIT_MAX_REQUESTS: u32 = 30;
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request counter keyed by client identifier. State lives in
/// process memory only; a restart forgets every window.
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request from `client`. The first request after a
    /// window expires starts a fresh window anchored at that request.
    pub fn admit(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match windows.get_mut(client) {
            Some(window) if now >= window.reset_at => {
                window.count = 1;
                window.reset_at = now + self.window;
                true
            }
            Some(window) => {
                if window.count < self.max_requests {
                    window.count += 1;
                    true
                } else {
                    false
                }
            }
            None => {
                windows.insert(
                    client.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }
}

/// Client identity for limiting purposes: first forwarded-for hop, then
/// real-ip, then loopback when the proxy headers are missing.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip(req.headers());

    if !state.limiter.admit(&client) {
        tracing::warn!("rate limited client {}", client);
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn admits_up_to_the_window_budget() {
        let limiter = FixedWindowLimiter::new(30, Duration::from_secs(60));

        for _ in 0..30 {
            assert!(limiter.admit("203.0.113.7"));
        }
        assert!(!limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));
    }

    #[test]
    fn budget_is_per_client() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.8"));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_millis(20));

        assert!(limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));

        std::thread::sleep(Duration::from_millis(30));

        assert!(limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));

        assert_eq!(client_ip(&headers), "198.51.100.4");
    }

    #[test]
    fn client_ip_falls_back_to_real_ip_then_loopback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));
        assert_eq!(client_ip(&headers), "198.51.100.9");

        assert_eq!(client_ip(&HeaderMap::new()), "127.0.0.1");
    }
}
