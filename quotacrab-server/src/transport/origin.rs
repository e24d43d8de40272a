//! Address normalisation for lookup targets
//!
//! The target of a lookup is either the `ip` query parameter or the client
//! origin. Both go through [`normalize_ip`] so that IPv4-mapped IPv6
//! addresses and the IPv6 loopback resolve like their IPv4 forms.

use axum::http::HeaderMap;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr};

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Canonical form of an address
///
/// - `::ffff:a.b.c.d` becomes `a.b.c.d`
/// - `::1` becomes `127.0.0.1`
pub fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                IpAddr::V4(v4)
            } else if v6.is_loopback() {
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            } else {
                ip
            }
        }
        IpAddr::V4(_) => ip,
    }
}

/// Parse a caller supplied target address
pub fn parse_target(raw: &str) -> Result<IpAddr, AddrParseError> {
    raw.trim().parse::<IpAddr>().map(normalize_ip)
}

/// Address the request came from
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` entry wins when it
/// parses; otherwise the peer address is used.
pub fn client_origin(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    let forwarded = trust_forwarded_for
        .then(|| headers.get(FORWARDED_FOR_HEADER))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    normalize_ip(forwarded.unwrap_or_else(|| peer.ip()))
}
