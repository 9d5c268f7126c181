//! Edge-side session stored in a signed cookie.
//!
//! The session is a small JSON object. It is loaded from the request's
//! `Cookie` header, mutated by handlers, and turned into a `Set-Cookie` value
//! by [`Session::commit`], which consumes the session so nothing can be
//! written after the cookie has been serialized.

use axum::extract::FromRequestParts;
use cookie::{Cookie, CookieJar, Key, SameSite};
use http::request::Parts;
use http::{HeaderMap, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::convert::Infallible;
use tracing::debug;

use crate::identity::CustomerAccessToken;
use crate::state::AppState;

/// Session key holding the edge frontend's customer access token.
pub const CUSTOMER_ACCESS_TOKEN: &str = "customerAccessToken";

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    WeakSecret(usize),
    #[error("failed to serialize session")]
    Encode(#[from] serde_json::Error),
}

/// Loads sessions from requests and signs them back into cookies.
#[derive(Clone)]
pub struct SessionCodec {
    cookie_name: String,
    key: Key,
    secure: bool,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("cookie_name", &self.cookie_name)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(cookie_name: &str, secret: &str, secure: bool) -> Result<Self, SessionError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret(secret.len()));
        }
        Ok(Self {
            cookie_name: cookie_name.to_owned(),
            key: Key::derive_from(secret.as_bytes()),
            secure,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Read the session cookie. Missing, tampered, or malformed cookies yield an empty session.
    pub fn load(&self, headers: &HeaderMap) -> Session {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE).iter() {
            let Ok(value) = value.to_str() else { continue };
            for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                if let Ok(cookie) = Cookie::parse_encoded(pair.to_owned()) {
                    jar.add_original(cookie);
                }
            }
        }

        let values = jar
            .signed(&self.key)
            .get(&self.cookie_name)
            .and_then(|cookie| serde_json::from_str::<Map<String, Value>>(cookie.value()).ok())
            .unwrap_or_default();

        Session {
            values,
            codec: self.clone(),
        }
    }

    /// An empty session, as if the request carried no cookie.
    pub fn empty(&self) -> Session {
        Session {
            values: Map::new(),
            codec: self.clone(),
        }
    }
}

/// Per-request session state.
#[derive(Debug)]
pub struct Session {
    values: Map<String, Value>,
    codec: SessionCodec,
}

impl Session {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SessionError> {
        self.values
            .insert(key.to_owned(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn customer_token(&self) -> Option<CustomerAccessToken> {
        self.get(CUSTOMER_ACCESS_TOKEN)
    }

    /// Replace any previous token. At most one token is held per session.
    pub fn set_customer_token(&mut self, token: &CustomerAccessToken) -> Result<(), SessionError> {
        self.set(CUSTOMER_ACCESS_TOKEN, token)
    }

    pub fn clear_customer_token(&mut self) {
        self.unset(CUSTOMER_ACCESS_TOKEN);
    }

    /// Serialize the final state into a `Set-Cookie` header value.
    ///
    /// An empty session produces an immediately expiring removal cookie.
    pub fn commit(self) -> Result<String, SessionError> {
        let Session { values, codec } = self;

        if values.is_empty() {
            let removal = Cookie::build((codec.cookie_name.clone(), ""))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(codec.secure)
                .max_age(time::Duration::ZERO)
                .build();
            return Ok(removal.encoded().to_string());
        }

        let payload = serde_json::to_string(&values)?;
        let mut jar = CookieJar::new();
        jar.signed_mut(&codec.key).add(
            Cookie::build((codec.cookie_name.clone(), payload))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(codec.secure),
        );

        let signed = jar
            .get(&codec.cookie_name)
            .map(|cookie| cookie.encoded().to_string())
            .unwrap_or_default();
        debug!(keys = values.len(), "session committed");
        Ok(signed)
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.sessions.load(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const SECRET: &str = "a-test-secret-that-is-long-enough-for-hkdf";

    fn codec() -> SessionCodec {
        SessionCodec::new("session", SECRET, true).unwrap()
    }

    fn token(value: &str) -> CustomerAccessToken {
        CustomerAccessToken {
            access_token: value.to_owned(),
            expires_at: "2030-01-01T00:00:00Z".parse().unwrap(),
        }
    }

    /// Turn a `Set-Cookie` value into the `Cookie` header a browser would send back.
    fn as_request_headers(set_cookie: &str) -> HeaderMap {
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("other=1; {pair}")).unwrap(),
        );
        headers
    }

    #[test]
    fn rejects_short_secret() {
        assert!(matches!(
            SessionCodec::new("session", "short", true),
            Err(SessionError::WeakSecret(5))
        ));
    }

    #[test]
    fn committed_token_reloads() {
        let codec = codec();
        let mut session = codec.empty();
        session.set_customer_token(&token("abc")).unwrap();
        let set_cookie = session.commit().unwrap();

        assert!(set_cookie.starts_with("session="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Secure"));

        let reloaded = codec.load(&as_request_headers(&set_cookie));
        assert_eq!(reloaded.customer_token(), Some(token("abc")));
    }

    #[test]
    fn last_token_wins() {
        let codec = codec();
        let mut session = codec.empty();
        session.set_customer_token(&token("first")).unwrap();
        session.set_customer_token(&token("second")).unwrap();
        let reloaded = codec.load(&as_request_headers(&session.commit().unwrap()));
        assert_eq!(reloaded.customer_token(), Some(token("second")));
    }

    #[test]
    fn tampered_cookie_is_ignored() {
        let codec = codec();
        let mut session = codec.empty();
        session.set_customer_token(&token("abc")).unwrap();
        let set_cookie = session.commit().unwrap();
        let tampered = set_cookie.replacen("abc", "abd", 1);

        let reloaded = codec.load(&as_request_headers(&tampered));
        assert!(reloaded.is_empty());
    }

    #[test]
    fn other_secret_cannot_read() {
        let mut session = codec().empty();
        session.set_customer_token(&token("abc")).unwrap();
        let set_cookie = session.commit().unwrap();

        let other = SessionCodec::new("session", &SECRET.repeat(2), true).unwrap();
        assert!(other.load(&as_request_headers(&set_cookie)).is_empty());
    }

    #[test]
    fn empty_session_commits_removal() {
        let codec = codec();
        let mut session = codec.empty();
        session.set_customer_token(&token("abc")).unwrap();
        session.clear_customer_token();
        let set_cookie = session.commit().unwrap();
        assert!(set_cookie.starts_with("session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }
}
