//! Auth bridge: replays legacy customer forms and mirrors the result into the edge session.
//!
//! Every flow follows the same shape. The submitted body is buffered once into
//! a [`FormSubmission`], which both the form reader and the upstream replay
//! borrow from. The replay never follows redirects, because the legacy
//! `Location` header decides the outcome. The session is committed last, after
//! every write for the flow has happened.

mod activate;
mod addresses;
mod login;
mod logout;
pub mod outcome;
mod recover;

pub use activate::activate;
pub use addresses::{add_address, update_address};
pub use login::{login, register};
pub use logout::logout;
pub use recover::recover;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Request};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::legacy::{LegacyError, UpstreamRequest, UpstreamResponse, UrlTranslator, response_headers};
use crate::session::Session;
use crate::web::proxy::MAX_BODY_BYTES;

pub(crate) const EMAIL_FIELD: &str = "customer[email]";
pub(crate) const PASSWORD_FIELD: &str = "customer[password]";

/// Where the edge sends the browser when the legacy response has no `Location`.
const DEFAULT_LOCATION: &str = "/account";

/// An inbound form POST whose body has been read exactly once.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FormSubmission {
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    /// First non-empty value of a urlencoded form field.
    pub fn field(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(&self.body)
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// The same POST, aimed at the legacy storefront. Shares the buffered body.
    pub fn replay(&self, urls: &UrlTranslator) -> UpstreamRequest {
        UpstreamRequest {
            method: Method::POST,
            url: urls.to_legacy(self.path_and_query()),
            headers: crate::legacy::forward_headers(&self.headers),
            body: Some(self.body.clone()),
        }
    }
}

impl<S: Send + Sync> FromRequest<S> for FormSubmission {
    type Rejection = Response;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|_| (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response())?;
        Ok(FormSubmission {
            uri: parts.uri,
            headers: parts.headers,
            body,
        })
    }
}

/// `Location` rewritten onto the edge origin, or [`DEFAULT_LOCATION`] when absent.
pub(crate) fn edge_location(urls: &UrlTranslator, location: Option<&str>, origin: &str) -> String {
    match location {
        Some(location) => urls.to_edge(location, origin),
        None => DEFAULT_LOCATION.to_owned(),
    }
}

/// Mirror the legacy response back to the browser with no body, a rewritten
/// `Location`, and (when given) the committed edge session appended as `Set-Cookie`.
pub(crate) fn redirect_response(
    upstream: &UpstreamResponse,
    location: &str,
    session: Option<Session>,
) -> Response {
    let mut headers = response_headers(&upstream.headers);
    headers.remove(header::CONTENT_ENCODING);
    headers.remove(header::CONTENT_TYPE);
    set_location(&mut headers, location);

    if let Some(session) = session
        && let Err(response) = append_session(&mut headers, session)
    {
        return response;
    }

    (upstream.status, headers, Body::empty()).into_response()
}

pub(crate) fn set_location(headers: &mut HeaderMap, location: &str) {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            headers.insert(header::LOCATION, value);
        }
        Err(e) => {
            warn!(error = %e, location, "unrepresentable Location, dropping header");
            headers.remove(header::LOCATION);
        }
    }
}

/// Commit the session and append it as a `Set-Cookie` header.
pub(crate) fn append_session(headers: &mut HeaderMap, session: Session) -> Result<(), Response> {
    let committed = session.commit().map_err(|e| {
        error!(error = %e, "failed to commit session");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to commit session").into_response()
    })?;
    let value = HeaderValue::from_str(&committed).map_err(|e| {
        error!(error = %e, "committed session is not a valid header value");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to commit session").into_response()
    })?;
    headers.append(header::SET_COOKIE, value);
    Ok(())
}

/// A plain-text response that also carries the committed session.
pub(crate) fn text_with_session(status: StatusCode, body: String, session: Session) -> Response {
    let mut headers = HeaderMap::new();
    if let Err(response) = append_session(&mut headers, session) {
        return response;
    }
    (status, headers, body).into_response()
}

/// Upstream failure inside an auth flow: 500 with the error text.
pub(crate) fn proxy_failure(flow: &str, err: &LegacyError) -> Response {
    error!(flow, error = %err, "legacy auth request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Error proxying {flow} request {err}"),
    )
        .into_response()
}

pub(crate) fn missing_credentials() -> Response {
    (StatusCode::BAD_REQUEST, "Missing email or password").into_response()
}
