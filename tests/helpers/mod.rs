//! Shared fixtures: an in-process router wired to a mock legacy storefront and
//! a recording identity provider.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, Response, header};
use std::sync::{Arc, Mutex};
use storefront_bridge::config::ProxyPolicy;
use storefront_bridge::identity::{CustomerAccessToken, IdentityProvider, LoginError};
use storefront_bridge::legacy::LegacyClient;
use storefront_bridge::session::{Session, SessionCodec};
use storefront_bridge::state::AppState;
use storefront_bridge::web::create_router;
use tower::ServiceExt;

pub const ORIGIN: &str = "https://shop.example.com";
pub const SECRET: &str = "integration-test-secret-integration-test-secret";
/// Nothing listens here; connections are refused immediately.
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

/// Identity provider that records every call and answers with a canned result.
pub struct StubIdentity {
    result: Result<CustomerAccessToken, LoginError>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubIdentity {
    pub fn accepting(access_token: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(token(access_token)),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(LoginError::unauthorized(message)),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn login(&self, email: &str, password: &str) -> Result<CustomerAccessToken, LoginError> {
        self.calls
            .lock()
            .unwrap()
            .push((email.to_owned(), password.to_owned()));
        self.result.clone()
    }
}

pub fn token(access_token: &str) -> CustomerAccessToken {
    CustomerAccessToken {
        access_token: access_token.to_owned(),
        expires_at: "2030-01-01T00:00:00Z".parse().unwrap(),
    }
}

pub fn codec() -> SessionCodec {
    SessionCodec::new("session", SECRET, false).unwrap()
}

pub fn state_with_policy(
    legacy_url: &str,
    identity: Arc<StubIdentity>,
    policy: ProxyPolicy,
    public_origin: Option<&str>,
) -> AppState {
    AppState::new(
        LegacyClient::new(legacy_url).unwrap(),
        identity,
        codec(),
        policy,
        public_origin.map(str::to_owned),
        "Hydrogen".to_owned(),
    )
}

pub fn app(legacy_url: &str, identity: Arc<StubIdentity>) -> Router {
    create_router(state_with_policy(
        legacy_url,
        identity,
        ProxyPolicy::default(),
        Some(ORIGIN),
    ))
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

pub fn credentials_form(form_type: &str, email: &str, password: &str) -> String {
    format!(
        "form_type={form_type}&utf8=%E2%9C%93&customer%5Bemail%5D={}&customer%5Bpassword%5D={}",
        urlencode(email),
        urlencode(password)
    )
}

pub fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_owned))
        .collect()
}

/// Reload the edge session the way the browser would on its next request.
pub fn session_after(response: &Response<Body>) -> Session {
    let mut headers = HeaderMap::new();
    for set_cookie in set_cookies(response) {
        if let Some(pair) = set_cookie.split(';').next()
            && pair.starts_with("session=")
        {
            headers.append(header::COOKIE, HeaderValue::from_str(pair).unwrap());
        }
    }
    codec().load(&headers)
}

/// `Cookie` header value for an edge session that already holds `access_token`.
pub fn logged_in_cookie(access_token: &str) -> String {
    let mut session = codec().empty();
    session.set_customer_token(&token(access_token)).unwrap();
    let committed = session.commit().unwrap();
    committed.split(';').next().unwrap().to_owned()
}
