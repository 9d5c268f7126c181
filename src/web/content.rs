//! Content routes: legacy account pages fetched, rewritten, and served as edge pages.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::legacy::{LegacyError, Redirects, UpstreamRequest, forward_headers, response_headers};
use crate::rewrite::{PageContext, is_soft_not_found, rewrite_html};
use crate::state::AppState;
use crate::web::origin::RequestOrigin;

/// Client IP attestation headers relayed to the legacy storefront.
const CLIENT_IP_HEADERS: &[&str] = &["x-shopify-client-ip", "x-shopify-client-ip-sig"];

/// `GET` handler for every informational account page.
pub async fn render_content(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    request: Request,
) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_owned();
    render_legacy_page(&state, &origin, &path_and_query, request.headers()).await
}

/// Fetch a legacy page and rewrite it for the edge origin.
///
/// An unreachable upstream is answered with 404 and the error text; any
/// other failure with 500 and a JSON error body.
pub async fn render_legacy_page(
    state: &AppState,
    origin: &str,
    path_and_query: &str,
    inbound: &HeaderMap,
) -> Response {
    let request = UpstreamRequest {
        method: http::Method::GET,
        url: state.legacy.urls().to_legacy(path_and_query),
        headers: page_request_headers(inbound, &state.legacy_user_agent),
        body: None,
    };

    match fetch_and_rewrite(state, origin, path_and_query, request).await {
        Ok(response) => response,
        Err(e) if e.is_transport() => {
            warn!(error = %e, path = path_and_query, "legacy page unreachable");
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e) => {
            warn!(error = %e, path = path_and_query, "failed to render legacy page");
            let body = serde_json::json!({ "error": e.to_string() }).to_string();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
    }
}

async fn fetch_and_rewrite(
    state: &AppState,
    origin: &str,
    path_and_query: &str,
    request: UpstreamRequest,
) -> Result<Response, LegacyError> {
    let upstream = state.legacy.send(request, Redirects::Follow).await?;
    let html = upstream.text()?;

    let page = PageContext {
        urls: state.legacy.urls(),
        origin,
        path_and_query,
    };
    let body = rewrite_html(&html, &page, &state.policy);

    let status = if is_soft_not_found(&html) {
        debug!(
            path = path_and_query,
            upstream_status = upstream.status.as_u16(),
            "legacy page is a soft 404"
        );
        StatusCode::NOT_FOUND
    } else {
        upstream.status
    };

    let mut headers = response_headers(&upstream.headers);
    headers.remove(header::CONTENT_ENCODING);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    if !headers.contains_key(header::CACHE_CONTROL)
        && let Ok(value) = HeaderValue::from_str(&state.policy.cache_control)
    {
        headers.insert(header::CACHE_CONTROL, value);
    }

    Ok((status, headers, body).into_response())
}

/// Inbound headers plus the fixed overrides every page fetch carries.
fn page_request_headers(inbound: &HeaderMap, user_agent: &str) -> HeaderMap {
    let mut headers = forward_headers(inbound);

    // Only gzip is decoded locally, so never let the upstream pick something else.
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    for name in CLIENT_IP_HEADERS {
        let value = inbound
            .get(*name)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(""));
        headers.insert(*name, value);
    }

    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(header::USER_AGENT, value);
    }
    headers
}
