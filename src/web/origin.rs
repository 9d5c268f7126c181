//! Resolution of the edge origin that the browser is talking to.
//!
//! Priority: configured `PUBLIC_ORIGIN` -> `X-Forwarded-Proto` + `X-Forwarded-Host`
//! (first hop) -> `Host` header -> request URI authority.
//!
//! ```ignore
//! async fn handler(RequestOrigin(origin): RequestOrigin, ...) -> impl IntoResponse { ... }
//! ```

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use http::header;
use http::request::Parts;

use crate::state::AppState;

/// Scheme and authority of the edge frontend, e.g. `https://shop.example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin(pub String);

impl FromRequestParts<AppState> for RequestOrigin {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(origin) = &state.public_origin {
            return Ok(RequestOrigin(origin.clone()));
        }
        resolve(parts).map(RequestOrigin).ok_or((
            StatusCode::BAD_REQUEST,
            "Unable to determine request origin",
        ))
    }
}

fn resolve(parts: &Parts) -> Option<String> {
    let proto = first_value(&parts.headers, "x-forwarded-proto")
        .or_else(|| parts.uri.scheme_str())
        .unwrap_or("http");

    let host = first_value(&parts.headers, "x-forwarded-host")
        .or_else(|| first_value(&parts.headers, header::HOST.as_str()))
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))?;

    Some(format!("{proto}://{host}"))
}

/// First comma-separated entry of a header, trimmed and non-empty.
fn first_value<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
