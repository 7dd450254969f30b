//! Caller identity: the key that partitions conversation memory and rate limits.

use axum::http::HeaderMap;
use nyaya_core::ANONYMOUS_IDENTITY;
use std::net::SocketAddr;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// First `X-Forwarded-For` hop when trusted, else the peer IP, else `"anonymous"`.
pub(crate) fn caller_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string())
}
