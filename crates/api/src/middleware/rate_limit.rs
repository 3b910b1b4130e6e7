//! Per-client rate limiting for the login endpoints.
//!
//! Each client IP gets its own GCRA limiter. Limiters live for the life of the
//! process; the key space is bounded by the number of distinct callers.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use serde_json::json;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};

use crate::extractors::client::client_ip;
use crate::response::FAILURE_CODE;

type ClientLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limiters keyed by client address.
pub struct RateLimiterState {
    limiters: RwLock<HashMap<String, Arc<ClientLimiter>>>,
    per_minute: u32,
}

impl RateLimiterState {
    pub fn new(per_minute: u32) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            per_minute,
        }
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    fn limiter_for(&self, key: &str) -> Arc<ClientLimiter> {
        {
            let limiters = self
                .limiters
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(limiter) = limiters.get(key) {
                return Arc::clone(limiter);
            }
        }

        let mut limiters = self
            .limiters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another request may have inserted it between the two locks.
        if let Some(limiter) = limiters.get(key) {
            return Arc::clone(limiter);
        }

        let per_minute = NonZeroU32::new(self.per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(GovRateLimiter::direct(Quota::per_minute(per_minute)));
        limiters.insert(key.to_string(), Arc::clone(&limiter));
        limiter
    }

    /// `Err(retry_after_secs)` when the caller is over quota.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        match self.limiter_for(key).check() {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait.as_secs().max(1))
            }
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiters
            .read()
            .map(|l| l.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("per_minute", &self.per_minute)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

/// Rejects requests over the per-IP quota with 429 and `Retry-After`.
pub async fn login_rate_limit(
    State(limiter): State<Arc<RateLimiterState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req).unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&ip) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!(client_ip = %ip, retry_after, "Login rate limit exceeded");
            rate_limited_response(retry_after)
        }
    }
}

fn rate_limited_response(retry_after: u64) -> Response {
    let body = json!({
        "code": FAILURE_CODE,
        "data": null,
        "msg": format!("Too many login attempts. Retry after {} seconds.", retry_after),
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
