//! Client origin address resolution.
//!
//! Sessions are bound to the address that logged in, so every request and
//! WebSocket handshake must agree on what "the client address" is. Behind a
//! reverse proxy that is the first hop in `X-Forwarded-For`; otherwise it is
//! the TCP peer.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

/// Header consulted when the gateway trusts its proxy.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Returns the client address for a request from `peer`.
///
/// With `trust_proxy`, the left-most parseable `X-Forwarded-For` entry wins.
/// IPv4-mapped IPv6 addresses are folded to IPv4 so dual-stack listeners
/// agree with IPv4 logins.
#[must_use]
pub fn resolve_origin(headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> IpAddr {
    let forwarded = trust_proxy
        .then(|| headers.get(FORWARDED_FOR))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    normalize(forwarded.unwrap_or_else(|| peer.ip()))
}

fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}
