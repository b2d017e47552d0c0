//! Client identity used for rate limiting

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::AppState;

/// Identifier a request is rate limited under
///
/// Taken from the configured proxy header when present, otherwise the peer
/// socket address, otherwise `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl ClientId {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let from_header = state.client_ip_header.as_deref().and_then(|name| {
            let value = parts.headers.get(name)?.to_str().ok()?;
            // Forwarding headers may list a chain; the first hop is the client
            let first = value.split(',').next()?.trim();
            (!first.is_empty()).then(|| first.to_string())
        });
        if let Some(client) = from_header {
            return Ok(ClientId(client));
        }

        let from_peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientId(
            from_peer.unwrap_or_else(|| Self::UNKNOWN.to_string()),
        ))
    }
}
