// Middleware for rate limiting and authentication

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-IP token bucket state
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Shared rate limiter state — clone freely (it's an Arc inside)
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    /// Buckets keyed by source IP
    buckets: DashMap<IpAddr, Bucket>,
    /// Maximum tokens per IP (burst capacity)
    capacity: f64,
    /// Tokens added per second (sustained rate)
    refill_rate: f64,
}

impl RateLimiter {
    /// Create a rate limiter.
    ///
    /// - `requests_per_second`: sustained rate per IP
    /// - `burst`: maximum burst (capacity above sustained rate)
    pub fn new(requests_per_second: f64, burst: f64) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                buckets: DashMap::new(),
                capacity: burst,
                refill_rate: requests_per_second,
            }),
        }
    }

    /// Returns true if the request from `ip` is within rate limits.
    /// Consumes one token.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut bucket = self.inner.buckets.entry(ip).or_insert_with(|| Bucket {
            tokens: self.inner.capacity,
            last_refill: now,
        });

        // Refill tokens based on elapsed time
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.inner.refill_rate).min(self.inner.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Purge buckets that have been idle for more than `idle_secs`.
    /// Call periodically from a background task to prevent unbounded growth.
    pub fn purge_idle(&self, idle_secs: u64) {
        let cutoff = Duration::from_secs(idle_secs);
        let now = Instant::now();
        self.inner
            .buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < cutoff);
    }

    /// Number of currently tracked IPs.
    pub fn tracked_ips(&self) -> usize {
        self.inner.buckets.len()
    }
}

/// Axum middleware that enforces per-IP rate limiting.
///
/// Extracts the source IP from the `X-Forwarded-For` header (proxy-aware)
/// and falls back to loopback. Returns 429 Too Many Requests when the bucket
/// for that IP is exhausted. If no limiter extension is present the request
/// passes through untouched.
pub async fn rate_limit_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(limiter) = request.extensions().get::<RateLimiter>().cloned() else {
        return Ok(next.run(request).await);
    };

    let ip = extract_ip(&request).unwrap_or(IpAddr::from([127, 0, 0, 1]));

    if limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(ip = %ip, "Rate limit exceeded");
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Extract client IP from request headers or connection info.
fn extract_ip(request: &Request<Body>) -> Option<IpAddr> {
    // Check X-Forwarded-For (set by reverse proxies like nginx, Caddy)
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            // Take the first (leftmost) IP — the actual client
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_rate_limiter_allows_within_burst() {
        // 2 req/s, burst of 10
        let limiter = RateLimiter::new(2.0, 10.0);
        let client = ip(1, 2, 3, 4);

        for i in 0..10 {
            assert!(
                limiter.check(client),
                "request {i} should be allowed within burst"
            );
        }
    }

    #[test]
    fn test_rate_limiter_blocks_over_burst() {
        let limiter = RateLimiter::new(1.0, 3.0); // burst of 3
        let client = ip(1, 2, 3, 4);

        assert!(limiter.check(client)); // 1
        assert!(limiter.check(client)); // 2
        assert!(limiter.check(client)); // 3
        assert!(!limiter.check(client)); // 4th — rejected
        assert!(!limiter.check(client)); // 5th — still rejected
    }

    #[test]
    fn test_rate_limiter_different_ips_independent() {
        let limiter = RateLimiter::new(1.0, 2.0); // burst of 2
        let alice = ip(1, 1, 1, 1);
        let bob = ip(2, 2, 2, 2);

        assert!(limiter.check(alice));
        assert!(limiter.check(alice));
        assert!(!limiter.check(alice)); // Alice blocked

        // Bob is unaffected
        assert!(limiter.check(bob));
        assert!(limiter.check(bob));
        assert!(!limiter.check(bob)); // Bob blocked independently
    }

    #[test]
    fn test_rate_limiter_tracked_ips() {
        let limiter = RateLimiter::new(10.0, 100.0);
        assert_eq!(limiter.tracked_ips(), 0);

        limiter.check(ip(1, 0, 0, 1));
        limiter.check(ip(1, 0, 0, 2));
        limiter.check(ip(1, 0, 0, 3));
        assert_eq!(limiter.tracked_ips(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_rate_limiting_many_ips() {
        // 500 unique IPs each making 1 request — all should be allowed
        let limiter = Arc::new(RateLimiter::new(10.0, 20.0));
        let allowed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut handles = Vec::new();

        for i in 0u32..500 {
            let l = Arc::clone(&limiter);
            let a = Arc::clone(&allowed);
            handles.push(tokio::spawn(async move {
                let ip_addr = IpAddr::V4(Ipv4Addr::new(
                    10,
                    (i / (256 * 256) % 256) as u8,
                    (i / 256 % 256) as u8,
                    (i % 256) as u8,
                ));
                if l.check(ip_addr) {
                    a.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Every unique IP has a fresh bucket — first request always allowed
        let count = allowed.load(std::sync::atomic::Ordering::Relaxed);
        assert_eq!(count, 500, "every unique IP's first request must be allowed");
    }
}
