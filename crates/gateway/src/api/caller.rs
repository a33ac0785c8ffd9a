//! `Caller` Axum extractor: raw `Authorization` value plus network origin.
//!
//! Classification happens later in the gate; this only pulls the raw inputs
//! out of the request.

use std::convert::Infallible;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct Caller {
    /// `Authorization` header exactly as sent.
    pub authorization: Option<String>,
    pub origin: String,
}

impl Caller {
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        Ok(Caller {
            authorization: authorization_header(&parts.headers),
            origin: client_origin(&parts.headers, peer, state.config.server.trust_forwarded_for),
        })
    }
}

/// The header value is passed on untouched; only `Bearer <secret>` with no
/// padding classifies as trusted. Non-UTF-8 bytes are replaced, so such a
/// header is still presented and fails.
pub fn authorization_header(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?;
    Some(String::from_utf8_lossy(raw.as_bytes()).into_owned())
}

pub fn client_origin(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn authorization_is_passed_through_verbatim() {
        let mut headers = HeaderMap::new();
        assert_eq!(authorization_header(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(authorization_header(&headers).as_deref(), Some("Bearer abc"));

        headers.insert("authorization", HeaderValue::from_static("Bearer   abc   "));
        assert_eq!(authorization_header(&headers).as_deref(), Some("Bearer   abc   "));

        headers.insert("authorization", HeaderValue::from_static("abc"));
        assert_eq!(authorization_header(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn forwarded_for_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        let peer: SocketAddr = "192.168.1.5:5555".parse().unwrap();

        assert_eq!(client_origin(&headers, Some(peer), true), "1.2.3.4");
        assert_eq!(client_origin(&headers, Some(peer), false), "192.168.1.5");
        assert_eq!(client_origin(&HeaderMap::new(), None, true), "unknown");
    }
}
