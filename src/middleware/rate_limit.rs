//! Per-IP rate limiting over a fixed window, kept in process memory.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::RateLimitConfig;

#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Arc<Mutex<HashMap<IpAddr, WindowEntry>>>,
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

enum Verdict {
    Allowed,
    Exceeded { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check(&self, ip: IpAddr) -> Verdict {
        let mut state = self.state.lock();
        let now = Instant::now();

        let entry = state.entry(ip).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        if entry.count > self.max_requests {
            let reset_at = entry.window_start + self.window;
            Verdict::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            }
        } else {
            Verdict::Allowed
        }
    }

    /// Drop entries whose window lapsed; called from a background task.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let window = self.window;
        state.retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }
}

pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.check(addr.ip()) {
        Verdict::Allowed => next.run(request).await,
        Verdict::Exceeded { retry_after } => {
            warn!(ip = %addr.ip(), retry_after_secs = retry_after.as_secs(), "rate limit exceeded");
            let body = serde_json::json!({
                "error": "too many requests",
                "retry_after_seconds": retry_after.as_secs(),
            });
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.as_secs().to_string())],
                axum::Json(body),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs,
        })
    }

    #[test]
    fn allows_up_to_the_window_budget() {
        let limiter = limiter(5, 60);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..5 {
            assert!(matches!(limiter.check(ip), Verdict::Allowed));
        }
        assert!(matches!(limiter.check(ip), Verdict::Exceeded { .. }));
    }

    #[test]
    fn budgets_are_tracked_per_ip() {
        let limiter = limiter(1, 60);
        let first: IpAddr = "10.0.0.1".parse().unwrap();
        let second: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(matches!(limiter.check(first), Verdict::Allowed));
        assert!(matches!(limiter.check(first), Verdict::Exceeded { .. }));
        assert!(matches!(limiter.check(second), Verdict::Allowed));
    }

    #[test]
    fn cleanup_drops_stale_entries() {
        let limiter = limiter(5, 0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        limiter.check(ip);
        limiter.cleanup();
        assert!(limiter.state.lock().is_empty());
    }
}
