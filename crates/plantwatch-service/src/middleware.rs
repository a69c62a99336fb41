//! API key authentication for the gateway.
//!
//! Every request must carry `?api_key=<key>` except:
//! - `OPTIONS` requests (CORS preflight)
//! - paths in [`PUBLIC_PATHS`]

use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Query, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::secrets::ApiKey;

/// Paths reachable without an API key.
pub const PUBLIC_PATHS: &[&str] = &["/"];

/// Whether `request` skips authentication.
pub fn is_exempt(request: &Request) -> bool {
    request.method() == Method::OPTIONS || PUBLIC_PATHS.contains(&request.uri().path())
}

/// The first `api_key` query parameter, percent-decoded.
fn provided_key(request: &Request) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(request.uri()).ok()?;
    pairs
        .into_iter()
        .find(|(name, _)| name == "api_key")
        .map(|(_, value)| value)
}

/// Reject requests without a valid `api_key` query parameter.
///
/// Returns 401 Unauthorized before any handler runs.
pub async fn require_api_key(
    State(api_key): State<ApiKey>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(&request) {
        return next.run(request).await;
    }

    match provided_key(&request) {
        Some(provided) if api_key.matches(&provided) => next.run(request).await,
        _ => {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            warn!(
                "Unauthorized access attempt from {} to {}",
                peer,
                request.uri().path()
            );
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Unauthorized",
            "message": "Valid API key required as query parameter: ?api_key=YOUR_KEY"
        })),
    )
        .into_response()
}
