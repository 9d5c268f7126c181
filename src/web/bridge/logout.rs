//! Logout: the edge session is cleared before the legacy storefront is even asked.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::{append_session, set_location};
use crate::legacy::{Redirects, UpstreamRequest, forward_headers, response_headers};
use crate::session::Session;
use crate::state::AppState;
use crate::web::origin::RequestOrigin;

/// `GET /account/logout`
pub async fn logout(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    mut session: Session,
    request: Request,
) -> Response {
    session.clear_customer_token();
    info!("edge session cleared");

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/account/logout");
    let upstream_request = UpstreamRequest {
        method: http::Method::GET,
        url: state.legacy.urls().to_legacy(path_and_query),
        headers: forward_headers(request.headers()),
        body: None,
    };

    let upstream = match state.legacy.send(upstream_request, Redirects::Manual).await {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!(error = %e, "legacy logout failed, edge session still cleared");
            // The local logout must stick even when the legacy side is unreachable.
            let mut headers = HeaderMap::new();
            if let Err(response) = append_session(&mut headers, session) {
                return response;
            }
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                headers,
                format!("Error proxying logout request {e}"),
            )
                .into_response();
        }
    };

    let location = match upstream.location() {
        Some(location) => state.legacy.urls().to_edge(location, &origin),
        None => origin.clone(),
    };

    let mut headers = response_headers(&upstream.headers);
    set_location(&mut headers, &location);
    if let Err(response) = append_session(&mut headers, session) {
        return response;
    }

    // The legacy page bytes go out untouched, still in their original encoding.
    (upstream.status, headers, Body::from(upstream.body)).into_response()
}
