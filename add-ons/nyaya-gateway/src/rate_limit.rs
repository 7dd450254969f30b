//! Per-caller sliding-window rate limit for `/chat`.

use crate::handlers::chat::reply_response;
use crate::identity::caller_identity;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) const REPLY_RATE_LIMITED: &str = "Too many requests. Please slow down.";

const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Request timestamps per caller. A limit of 0 disables limiting.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    requests: Arc<DashMap<String, VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn per_minute(limit: u32) -> Self {
        Self::with_window(limit, DEFAULT_WINDOW)
    }

    pub(crate) fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            limit: limit as usize,
            window,
        }
    }

    /// Records a request for `identity` and returns whether it is within budget.
    /// Rejected requests are not recorded.
    pub(crate) fn check(&self, identity: &str) -> bool {
        if self.limit == 0 {
            return true;
        }
        let now = Instant::now();
        let mut stamps = self.requests.entry(identity.to_string()).or_default();
        while stamps
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            stamps.pop_front();
        }
        if stamps.len() >= self.limit {
            return false;
        }
        stamps.push_back(now);
        true
    }

    /// Drops callers with no request inside the window.
    pub(crate) fn cleanup(&self) {
        let now = Instant::now();
        self.requests.retain(|_, stamps| {
            stamps.retain(|&t| now.duration_since(t) < self.window);
            !stamps.is_empty()
        });
        tracing::debug!(target: "nyaya::gateway", active_callers = self.requests.len(), "Rate limiter cleanup");
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }
}

/// Middleware for `/chat`: answers 429 with the standard reply shape when over budget.
pub(crate) async fn limit_chat(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = caller_identity(request.headers(), peer, state.config.trust_forwarded_for);

    if !state.limiter.check(&identity) {
        tracing::warn!(target: "nyaya::gateway", identity = %identity, "Chat rate limit exceeded");
        return reply_response(StatusCode::TOO_MANY_REQUESTS, REPLY_RATE_LIMITED);
    }
    next.run(request).await
}

/// Periodically prunes idle callers from the limiter.
pub(crate) async fn cleanup_loop(limiter: RateLimiter) {
    let mut interval = tokio::time::interval(limiter.window());
    loop {
        interval.tick().await;
        limiter.cleanup();
    }
}
