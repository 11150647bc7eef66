use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use agenda_core::identity::IdentityHeaders;

use crate::error::BookingServiceError;
use crate::usecase::booking::{Caller, Credential};

pub const ACTION_TOKEN_HEADER: &str = "x-action-token";

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or(real)
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_owned())
}

fn credential(headers: &HeaderMap) -> Credential {
    if IdentityHeaders::from_headers(headers).is_some_and(|id| id.is_admin()) {
        return Credential::Admin;
    }
    headers
        .get(ACTION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or(Credential::Anonymous, |t| Credential::Token(t.to_owned()))
}

/// Socket peer address, ignoring forwarding headers.
///
/// Webhook limits key on this so a caller cannot pick its own bucket by
/// rotating `X-Forwarded-For`.
pub struct PeerIp(pub String);

impl<S> FromRequestParts<S> for PeerIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.ip().to_string());
        async move { Ok(Self(ip)) }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let caller = Caller {
            credential: credential(&parts.headers),
            ip: client_ip(&parts.headers, peer),
        };
        async move { Ok(caller) }
    }
}

/// Staff sessions without the admin role are refused.
pub fn require_admin(identity: &IdentityHeaders) -> Result<(), BookingServiceError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(BookingServiceError::Forbidden)
    }
}
