//! Client identification utilities
//!
//! Builds the per-request client context (network address and user agent)
//! that is passed explicitly into the session and gate logic.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;

/// Maximum stored user agent length
const MAX_USER_AGENT_LEN: usize = 512;

/// Proxy headers consulted in order when they are trusted
const PROXY_IP_HEADERS: [&str; 2] = ["cf-connecting-ip", "x-real-ip"];

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Client IP address
    pub ip: IpAddr,
    /// User-Agent header, truncated
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new(ip: IpAddr, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }

    /// Build the context from request headers and the socket peer address
    pub fn from_request(headers: &HeaderMap, peer_ip: IpAddr, trust_proxy_headers: bool) -> Self {
        Self {
            ip: extract_client_ip(headers, peer_ip, trust_proxy_headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Extract client IP address from headers
///
/// Forwarding headers can be forged by any client, so they are only
/// consulted behind a reverse proxy that overwrites them. The order is
/// `CF-Connecting-IP`, `X-Real-IP`, then the first `X-Forwarded-For` entry.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `peer_ip` - Direct connection IP address
/// * `trust_proxy_headers` - Whether forwarding headers are honored
pub fn extract_client_ip(headers: &HeaderMap, peer_ip: IpAddr, trust_proxy_headers: bool) -> IpAddr {
    if !trust_proxy_headers {
        return peer_ip;
    }

    for name in PROXY_IP_HEADERS {
        if let Some(ip) = header_ip(headers, name) {
            return ip;
        }
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .unwrap_or(peer_ip)
}

/// Extract the User-Agent header, truncated on a character boundary
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    let ua = headers.get(header::USER_AGENT)?.to_str().ok()?.trim();
    if ua.is_empty() {
        return None;
    }
    Some(ua.chars().take(MAX_USER_AGENT_LEN).collect())
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[test]
    fn test_proxy_headers_ignored_when_untrusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("192.168.1.1"));

        assert_eq!(extract_client_ip(&headers, peer(), false), peer());
    }

    #[test]
    fn test_extract_client_ip_xff() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ip = extract_client_ip(&headers, peer(), true);
        assert_eq!(ip, "192.168.1.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_header_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.3"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("2001:db8::1"));

        assert_eq!(
            extract_client_ip(&headers, peer(), true),
            "2001:db8::1".parse::<IpAddr>().unwrap()
        );

        headers.remove("cf-connecting-ip");
        assert_eq!(
            extract_client_ip(&headers, peer(), true),
            "10.0.0.2".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_garbage_header_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));

        assert_eq!(extract_client_ip(&headers, peer(), true), peer());
    }

    #[test]
    fn test_client_context_from_request() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0 Test"));

        let ctx = ClientContext::from_request(&headers, peer(), false);
        assert_eq!(ctx.ip, peer());
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0 Test"));

        let ctx = ClientContext::from_request(&HeaderMap::new(), peer(), false);
        assert_eq!(ctx.user_agent, None);
    }
}
