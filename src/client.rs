use axum::http::HeaderMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

// Shared bucket for every client we can't identify
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Bucket identifier for rate limiting, normally the client IP.
///
/// Clients behind the same NAT, and all clients with no usable address,
/// share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    /// X-Forwarded-For (first hop), then X-Real-IP, then the peer address.
    /// Header values that don't parse as an IP are skipped.
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> Self {
        let forwarded = trust_forwarded
            .then(|| {
                header_ip(headers, "x-forwarded-for")
                    .or_else(|| header_ip(headers, "x-real-ip"))
            })
            .flatten();

        forwarded
            .or_else(|| peer.map(|p| p.ip()))
            .map(|ip| Self(ip.to_string()))
            .unwrap_or_else(Self::unknown)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }
}

// Leftmost entry of a possibly comma-separated list
fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}
