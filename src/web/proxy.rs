//! Passthrough proxy: forwards requests with no special semantics to the legacy storefront.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::legacy::{
    LegacyError, Redirects, UpstreamRequest, UpstreamResponse, forward_headers, response_headers,
};
use crate::state::AppState;

/// Upper bound on buffered request bodies.
pub(crate) const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Forward a request verbatim (method, headers, and for non-GET the body).
pub async fn passthrough(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Option<Bytes>,
) -> Result<UpstreamResponse, LegacyError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let body = if method == Method::GET || method == Method::HEAD {
        None
    } else {
        body
    };

    let request = UpstreamRequest {
        url: state.legacy.urls().to_legacy(path_and_query),
        method,
        headers: forward_headers(headers),
        body,
    };
    state.legacy.send(request, Redirects::Follow).await
}

/// Hand a legacy response to the client untouched (minus hop-by-hop headers).
pub(crate) fn raw_response(upstream: UpstreamResponse) -> Response {
    let headers = response_headers(&upstream.headers);
    (upstream.status, headers, Body::from(upstream.body)).into_response()
}

/// Fallback for every path without dedicated handling.
///
/// Reads surface a non-2xx upstream as a plain 404; writes return the upstream
/// response as-is.
pub async fn catch_all(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let is_read = parts.method == Method::GET || parts.method == Method::HEAD;

    let body = if is_read {
        None
    } else {
        match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(error = %e, "Failed to buffer request body");
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        }
    };

    let upstream = match passthrough(
        &state,
        parts.method.clone(),
        &parts.uri,
        &parts.headers,
        body,
    )
    .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!(error = %e, path = parts.uri.path(), "passthrough request failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error proxying request {e}"),
            )
                .into_response();
        }
    };

    if is_read && !upstream.status.is_success() {
        debug!(
            path = parts.uri.path(),
            status = upstream.status.as_u16(),
            "upstream read failed, answering not found"
        );
        return (
            StatusCode::NOT_FOUND,
            format!("{} not found", parts.uri.path()),
        )
            .into_response();
    }

    raw_response(upstream)
}
