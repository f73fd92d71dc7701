//! Token-bucket rate limiting keyed by client IP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use core_config::rate_limit::RateLimitConfig;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::audit::extract_ip_from_headers;
use crate::errors::AppError;

/// One token bucket per client IP.
pub struct IpRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    trust_forwarded_for: bool,
}

impl IpRateLimiter {
    /// `None` when limiting is disabled or misconfigured with a zero rate.
    pub fn from_config(config: &RateLimitConfig) -> Option<Arc<Self>> {
        if !config.enabled {
            return None;
        }
        let rate = NonZeroU32::new(config.requests_per_second)?;
        let burst = NonZeroU32::new(config.burst)?;
        let quota = Quota::per_second(rate).allow_burst(burst);
        Some(Arc::new(Self {
            limiter: RateLimiter::keyed(quota),
            trust_forwarded_for: config.trust_forwarded_for,
        }))
    }

    /// Take one token for `ip`. False when the bucket is empty.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Periodically drop buckets for clients that have gone quiet.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.limiter.retain_recent();
                limiter.limiter.shrink_to_fit();
            }
        })
    }
}

/// The socket peer address. Forwarded headers count only when the limiter
/// sits behind a trusted proxy.
fn client_ip(request: &Request, trust_forwarded_for: bool) -> IpAddr {
    let forwarded = trust_forwarded_for
        .then(|| extract_ip_from_headers(request.headers()))
        .flatten()
        .and_then(|ip| ip.parse().ok());

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware rejecting requests with 429 once a client's bucket is empty.
pub async fn rate_limit(
    State(limiter): State<Arc<IpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request, limiter.trust_forwarded_for);
    if limiter.check(ip) {
        next.run(request).await
    } else {
        tracing::debug!(%ip, "rate limit exceeded");
        AppError::TooManyRequests.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    fn config(enabled: bool, rps: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled,
            requests_per_second: rps,
            burst,
            trust_forwarded_for: false,
        }
    }

    fn app(config: &RateLimitConfig) -> Router {
        let limiter = IpRateLimiter::from_config(config).unwrap();
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit))
    }

    fn from_peer(peer: &str, forwarded_for: &str) -> Request<Body> {
        let peer: SocketAddr = peer.parse().unwrap();
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", forwarded_for)
            .extension(ConnectInfo(peer))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_disabled_limiter_is_not_built() {
        assert!(IpRateLimiter::from_config(&config(false, 2, 4)).is_none());
    }

    #[test]
    fn test_buckets_are_per_ip() {
        let limiter = IpRateLimiter::from_config(&config(true, 1, 2)).unwrap();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a));
        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
    }

    #[tokio::test]
    async fn test_middleware_returns_429_when_exhausted() {
        let app = app(&config(true, 1, 1));

        let first = app
            .clone()
            .oneshot(from_peer("198.51.100.7:40000", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app
            .oneshot(from_peer("198.51.100.7:40001", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_shares_the_peer_bucket() {
        let app = app(&config(true, 1, 1));

        let mut accepted = 0;
        for i in 0..20 {
            let response = app
                .clone()
                .oneshot(from_peer("198.51.100.7:40000", &format!("10.0.0.{i}")))
                .await
                .unwrap();
            if response.status() == StatusCode::OK {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_trusted_proxy_keys_on_forwarded_for() {
        let app = app(&RateLimitConfig {
            trust_forwarded_for: true,
            ..config(true, 1, 1)
        });

        let a = app
            .clone()
            .oneshot(from_peer("192.0.2.1:40000", "203.0.113.9"))
            .await
            .unwrap();
        let b = app
            .clone()
            .oneshot(from_peer("192.0.2.1:40000", "203.0.113.10"))
            .await
            .unwrap();
        let a_again = app
            .oneshot(from_peer("192.0.2.1:40000", "203.0.113.9"))
            .await
            .unwrap();

        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);
        assert_eq!(a_again.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
