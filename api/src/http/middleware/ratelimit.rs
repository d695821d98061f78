/// Rate limiting middleware
///
/// Fixed window in-memory strategy keyed by client IP, applied to the
/// configured path prefixes only

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use dashmap::DashMap;
use futures_util::future::LocalBoxFuture;
use garden_auth::wire::ErrorBody;
use std::{
    future::{ready, Ready},
    net::IpAddr,
    rc::Rc,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::config::RateLimitConfig;

/// Windows are pruned once the table grows past this many keys
const PRUNE_THRESHOLD: usize = 50_000;

#[derive(Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Counts requests per key in fixed windows
#[derive(Clone)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: Arc<DashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(DashMap::new()),
        }
    }

    /// Count one request for `key`; `Err` carries the seconds until the window resets
    pub fn check(&self, key: &str, now: Instant) -> Result<(), u64> {
        if self.windows.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            self.windows
                .retain(|_, entry| now.duration_since(entry.window_start) < window);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.window_start);
            // Round up so clients never retry inside the same window
            let remaining = self.window.saturating_sub(elapsed);
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(retry_after.max(1));
        }

        entry.count += 1;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RateLimit {
    config: RateLimitConfig,
    limiter: FixedWindowLimiter,
}

impl RateLimit {
    pub fn new(config: RateLimitConfig) -> Self {
        let limiter = FixedWindowLimiter::new(
            config.ip_max_requests,
            Duration::from_secs(config.ip_window_secs.max(1)),
        );
        Self { config, limiter }
    }

    fn extract_client_ip(req: &ServiceRequest, respect_xff: bool) -> Option<IpAddr> {
        if respect_xff {
            if let Some(xff) = req.headers().get("x-forwarded-for") {
                if let Ok(xff_str) = xff.to_str() {
                    // First parseable hop is the original client
                    for ip_str in xff_str.split(',') {
                        if let Ok(ip) = ip_str.trim().parse::<IpAddr>() {
                            return Some(ip);
                        }
                    }
                }
            }
        }

        req.peer_addr().map(|addr| addr.ip())
    }

    fn is_protected(&self, path: &str) -> bool {
        self.config
            .protect_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            limit: self.clone(),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limit: RateLimit,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let config = &self.limit.config;
        if config.enabled && self.limit.is_protected(req.path()) {
            match RateLimit::extract_client_ip(&req, config.respect_x_forwarded_for) {
                Some(ip) => {
                    if let Err(retry_after) =
                        self.limit.limiter.check(&format!("ip:{}", ip), Instant::now())
                    {
                        tracing::warn!(
                            client_ip = %ip,
                            limit = config.ip_max_requests,
                            window = config.ip_window_secs,
                            retry_after = retry_after,
                            method = %req.method(),
                            path = %req.path(),
                            "Rate limit exceeded"
                        );

                        let response = HttpResponse::TooManyRequests()
                            .insert_header(("Retry-After", retry_after.to_string()))
                            .json(ErrorBody {
                                error: "rate_limited".to_string(),
                                details: Some(format!("retry after {}s", retry_after)),
                                missing: None,
                            });

                        let (req, _) = req.into_parts();
                        return Box::pin(async move {
                            Ok(ServiceResponse::new(req, response).map_into_right_body())
                        });
                    }
                }
                None => tracing::warn!("Unable to determine client IP for rate limiting"),
            }
        }

        let service = self.service.clone();
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, web, App};

    #[test]
    fn test_window_blocks_then_resets() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check("ip:1.2.3.4", start).is_ok());
        assert!(limiter.check("ip:1.2.3.4", start).is_ok());
        assert_eq!(
            limiter.check("ip:1.2.3.4", start + Duration::from_millis(500)),
            Err(60)
        );
        assert!(limiter.check("ip:5.6.7.8", start).is_ok());
        assert!(limiter
            .check("ip:1.2.3.4", start + Duration::from_secs(60))
            .is_ok());
    }

    #[actix_web::test]
    async fn test_only_protected_prefixes_are_limited() {
        let config = RateLimitConfig {
            ip_max_requests: 1,
            ..RateLimitConfig::default()
        };
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimit::new(config))
                .route("/api/auth/challenge", web::get().to(|| async { "ok" }))
                .route("/healthz", web::get().to(|| async { "ok" })),
        )
        .await;

        let peer = "10.0.0.1:4000".parse().unwrap();
        for expected in [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
            let req = actix_test::TestRequest::get()
                .uri("/api/auth/challenge")
                .peer_addr(peer)
                .to_request();
            let res = actix_test::call_service(&app, req).await;
            assert_eq!(res.status(), expected);
            if expected == StatusCode::TOO_MANY_REQUESTS {
                assert!(res.headers().contains_key("retry-after"));
            }
        }

        for _ in 0..3 {
            let req = actix_test::TestRequest::get()
                .uri("/healthz")
                .peer_addr(peer)
                .to_request();
            assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);
        }
    }
}
