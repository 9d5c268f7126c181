//! Edge frontend identity: exchanges customer credentials for an access token
//! through the storefront GraphQL API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Header carrying the public storefront API token.
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Storefront-Access-Token";

const LOGIN_MUTATION: &str = r#"
    mutation login($input: CustomerAccessTokenCreateInput!) {
      customerAccessTokenCreate(input: $input) {
        customerUserErrors { code field message }
        customerAccessToken { accessToken expiresAt }
      }
    }
"#;

/// Edge frontend credential stored in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A failed login, with the status the edge frontend reports for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LoginError {
    pub status: StatusCode,
    pub message: String,
}

impl LoginError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }
}

/// Mints edge frontend access tokens from customer credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<CustomerAccessToken, LoginError>;
}

/// [`IdentityProvider`] backed by the storefront GraphQL API.
pub struct StorefrontIdentity {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl StorefrontIdentity {
    pub fn new(endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            access_token: access_token.into(),
        }
    }

    async fn mutate(&self, variables: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::json!({
            "query": LOGIN_MUTATION,
            "variables": variables,
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("storefront GraphQL request failed ({status}): {text}");
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl IdentityProvider for StorefrontIdentity {
    async fn login(&self, email: &str, password: &str) -> Result<CustomerAccessToken, LoginError> {
        let variables = serde_json::json!({ "input": { "email": email, "password": password } });

        let json = self.mutate(variables).await.map_err(|e| {
            warn!(error = %e, "storefront login request failed");
            LoginError::unauthorized(e.to_string())
        })?;

        let result = parse_login_response(&json);
        match &result {
            Ok(_) => debug!("storefront login succeeded"),
            Err(e) => debug!(error = %e, "storefront login rejected"),
        }
        result
    }
}

/// Interpret a `customerAccessTokenCreate` payload.
fn parse_login_response(json: &serde_json::Value) -> Result<CustomerAccessToken, LoginError> {
    let payload = &json["data"]["customerAccessTokenCreate"];
    let token = &payload["customerAccessToken"];

    if let Some(access_token) = token["accessToken"].as_str().filter(|t| !t.is_empty()) {
        let expires_at = token["expiresAt"]
            .as_str()
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .ok_or_else(|| LoginError::unauthorized("Invalid access token expiry"))?;
        return Ok(CustomerAccessToken {
            access_token: access_token.to_owned(),
            expires_at,
        });
    }

    let message = payload["customerUserErrors"][0]["message"]
        .as_str()
        .or_else(|| json["errors"][0]["message"].as_str())
        .unwrap_or("Unable to log in");
    Err(LoginError::unauthorized(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token() {
        let json = serde_json::json!({
            "data": { "customerAccessTokenCreate": {
                "customerUserErrors": [],
                "customerAccessToken": {
                    "accessToken": "tok_123",
                    "expiresAt": "2030-05-01T12:00:00Z"
                }
            }}
        });
        let token = parse_login_response(&json).unwrap();
        assert_eq!(token.access_token, "tok_123");
        assert_eq!(token.expires_at.to_rfc3339(), "2030-05-01T12:00:00+00:00");
    }

    #[test]
    fn surfaces_first_user_error() {
        let json = serde_json::json!({
            "data": { "customerAccessTokenCreate": {
                "customerUserErrors": [
                    { "code": "UNIDENTIFIED_CUSTOMER", "field": ["input"], "message": "Unidentified customer" }
                ],
                "customerAccessToken": null
            }}
        });
        let err = parse_login_response(&json).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Unidentified customer");
    }

    #[test]
    fn top_level_graphql_error() {
        let json = serde_json::json!({ "errors": [{ "message": "Throttled" }] });
        assert_eq!(parse_login_response(&json).unwrap_err().message, "Throttled");
    }

    #[test]
    fn token_serializes_camel_case() {
        let token = CustomerAccessToken {
            access_token: "t".to_owned(),
            expires_at: "2030-05-01T12:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value["accessToken"], "t");
        assert!(value["expiresAt"].is_string());
    }
}
