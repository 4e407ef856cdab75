//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down
//! credential stuffing and refresh token guessing.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::net::SocketAddr;
use std::{num::NonZeroU32, sync::Arc};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for user registration (3 per minute)
    pub register: Arc<IpLimiter>,
    /// Per-IP limiter for login attempts (30 per minute)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for token refresh (60 per minute)
    pub refresh: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with production quotas.
    pub fn new() -> Self {
        Self::with_quotas(3, 30, 60)
    }

    /// Effectively unlimited quotas, for tests that hammer the endpoints.
    pub fn relaxed() -> Self {
        Self::with_quotas(100_000, 100_000, 100_000)
    }

    fn with_quotas(register_per_min: u32, login_per_min: u32, refresh_per_min: u32) -> Self {
        let quota = |per_min: u32| {
            Quota::per_minute(NonZeroU32::new(per_min).expect("quota must be nonzero"))
        };
        Self {
            register: Arc::new(RateLimiter::keyed(quota(register_per_min))),
            login: Arc::new(RateLimiter::keyed(quota(login_per_min))),
            refresh: Arc::new(RateLimiter::keyed(quota(refresh_per_min))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort client IP: X-Forwarded-For first (reverse proxy), then the
/// socket address. Falls back to a shared bucket when neither is available.
fn client_ip(request: &Request) -> String {
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(first_ip) = value.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "local".to_string())
}

fn check(limiter: &IpLimiter, request: &Request) -> Result<(), Response> {
    match limiter.check_key(&client_ip(request)) {
        Ok(_) => Ok(()),
        Err(_) => Err((
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response()),
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&config.register, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&config.login, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting token refresh.
pub async fn rate_limit_refresh(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&config.refresh, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
