//! Identity Resolver: who is this request, without any client-side state.
//!
//! IP comes from the socket, or from the entry our own proxy appended to
//! `X-Forwarded-For` when one is configured. Entries to the left of that are
//! client-controlled and never used. The fingerprint is whatever the browser
//! computed, or a hash of the request's own headers.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use gatehouse_common::constants::headers as header_names;
use gatehouse_common::constants::{FINGERPRINT_LEN, MAX_CLIENT_FINGERPRINT_LEN, UNKNOWN};
use gatehouse_common::{ClientIdentity, DeviceInfo};

/// Socket peer address, when the server was started with connect info
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for PeerAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PeerAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}

/// Derives [`ClientIdentity`] values from request metadata
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    trust_forwarded_for: bool,
    trusted_hops: usize,
}

impl IdentityResolver {
    /// `trusted_hops` is how many proxies we run in front of the gateway,
    /// each appending its peer to `X-Forwarded-For`
    pub fn new(trust_forwarded_for: bool, trusted_hops: usize) -> Self {
        Self {
            trust_forwarded_for,
            trusted_hops: trusted_hops.max(1),
        }
    }

    pub fn resolve(
        &self,
        headers: &HeaderMap,
        peer: PeerAddr,
        device: Option<&DeviceInfo>,
    ) -> ClientIdentity {
        let ip_address = self.client_ip(headers, peer);

        let user_agent = header_str(headers, header::USER_AGENT.as_str())
            .or_else(|| device.and_then(|d| non_blank(d.user_agent.as_deref())))
            .unwrap_or(UNKNOWN)
            .to_string();

        let fingerprint = device
            .and_then(|d| non_blank(d.fingerprint.as_deref()))
            .map(|fp| fp.chars().take(MAX_CLIENT_FINGERPRINT_LEN).collect())
            .unwrap_or_else(|| {
                let accept = header_str(headers, header::ACCEPT.as_str()).unwrap_or("");
                synthesize_fingerprint(&ip_address, &user_agent, accept)
            });

        ClientIdentity {
            ip_address,
            fingerprint,
            user_agent,
        }
    }

    fn client_ip(&self, headers: &HeaderMap, peer: PeerAddr) -> String {
        let forwarded = self
            .trust_forwarded_for
            .then(|| header_str(headers, header_names::X_FORWARDED_FOR))
            .flatten()
            .and_then(|chain| self.trusted_hop(chain));

        let real_ip = || {
            self.trust_forwarded_for
                .then(|| header_str(headers, header_names::X_REAL_IP))
                .flatten()
                .and_then(parse_ip)
        };

        forwarded
            .or_else(real_ip)
            .or_else(|| peer.0.map(|addr| addr.ip().to_canonical()))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// The entry appended by the outermost of our proxies
    fn trusted_hop(&self, chain: &str) -> Option<IpAddr> {
        let hops: Vec<&str> = chain
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect();
        let index = hops.len().saturating_sub(self.trusted_hops);
        hops.get(index).copied().and_then(parse_ip)
    }
}

/// Truncated hash of IP, user agent, and accept header
pub fn synthesize_fingerprint(ip: &str, user_agent: &str, accept: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.as_bytes());
    hasher.update(b"|");
    hasher.update(accept.as_bytes());

    let hex: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
    hex[..FINGERPRINT_LEN].to_string()
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    non_blank(headers.get(name).and_then(|v| v.to_str().ok()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
