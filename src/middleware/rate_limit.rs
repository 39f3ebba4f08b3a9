use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, ErrorResponse};

/// Per-client request limiter.
///
/// Owned by application state and handed to the middleware, so every
/// router (and every test) gets its own independent budget.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    /// Key on X-Forwarded-For instead of the socket peer. Only safe behind
    /// a proxy that overwrites the header.
    trust_forwarded_for: bool,
}

impl RateLimitLayer {
    /// `requests` per `per_seconds`, allowing the whole budget as a burst
    pub fn new(requests: u32, per_seconds: u64) -> AppResult<Self> {
        let burst = NonZeroU32::new(requests)
            .ok_or_else(|| AppError::Config("rate limit requests must be > 0".to_string()))?;
        let replenish = Duration::from_secs(per_seconds.max(1)) / burst.get();
        let quota = Quota::with_period(replenish)
            .ok_or_else(|| AppError::Config("rate limit window must be > 0".to_string()))?
            .allow_burst(burst);

        Ok(RateLimitLayer {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            trust_forwarded_for: false,
        })
    }

    pub fn with_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn check(&self, client: IpAddr) -> bool {
        self.limiter.check_key(&client).is_ok()
    }

    /// Drop state for clients whose budget has fully recovered
    pub fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!("Rate limiter tracking {} clients", self.limiter.len());
    }

    /// Client address: first X-Forwarded-For hop when trusted, else the
    /// socket peer
    fn client_ip(&self, req: &Request) -> IpAddr {
        let forwarded = || {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        };
        let peer = || {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        };

        let ip = if self.trust_forwarded_for {
            forwarded().or_else(peer)
        } else {
            peer()
        };
        ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitLayer>,
    req: Request,
    next: Next,
) -> Response {
    let client = limiter.client_ip(&req);
    if !limiter.check(client) {
        warn!("Rate limit exceeded for {}", client);
        let body = Json(ErrorResponse {
            success: false,
            error: "Rate limit exceeded. Please try again later.".to_string(),
            error_code: "RATE_LIMITED".to_string(),
        });
        return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    }

    next.run(req).await
}
