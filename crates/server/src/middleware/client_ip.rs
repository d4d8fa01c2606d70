//! Real client address behind proxies.
//!
//! Proxy headers are consulted first (Cloudflare, then the standard
//! forwarding headers, then Fly.io), then the socket peer address. The
//! result keys both the rate limiter and the anonymous daily quota.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};

use picmaker_core::Origin;

use crate::error::AppError;

/// Headers holding a single address, in lookup order.
const SINGLE_ADDRESS_HEADERS: &[&str] = &["x-real-ip", "fly-client-ip"];

/// Resolve the client address from proxy headers or the connection.
#[must_use]
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(ip) = header("cf-connecting-ip").and_then(|s| s.trim().parse().ok()) {
        return Some(ip);
    }

    // First address in the chain is the original client
    if let Some(ip) = header("x-forwarded-for")
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
    {
        return Some(ip);
    }

    if let Some(ip) = SINGLE_ADDRESS_HEADERS
        .iter()
        .find_map(|name| header(name).and_then(|s| s.trim().parse().ok()))
    {
        return Some(ip);
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Extractor for the anonymous caller's quota key.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(ClientOrigin(origin): ClientOrigin) -> impl IntoResponse {
///     format!("hello {origin}")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ClientOrigin(pub Origin);

impl<S> FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        client_ip(&parts.headers, &parts.extensions)
            .map(|ip| Self(Origin::from(ip)))
            .ok_or_else(|| AppError::BadRequest("could not determine client address".to_owned()))
    }
}
