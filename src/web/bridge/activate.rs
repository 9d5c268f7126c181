//! Account activation.
//!
//! The activation form only carries a password. After the legacy storefront
//! accepts it, the customer's email is read off the now logged-in account
//! page so the edge frontend can be logged in with the same credentials.

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::outcome::{BridgeOutcome, bridge_login, classify};
use super::{
    FormSubmission, PASSWORD_FIELD, edge_location, missing_credentials, proxy_failure,
    redirect_response, text_with_session,
};
use crate::legacy::{Redirects, UpstreamRequest, UpstreamResponse, forward_headers};
use crate::rewrite::extract_embedded_email;
use crate::session::Session;
use crate::state::AppState;
use crate::web::origin::RequestOrigin;

const FLOW: &str = "activate post";

/// `POST /account/activate`, where the legacy form posts with hidden `id` and
/// `token` fields. The `/account/activate/{id}/{token}` variant is accepted too.
pub async fn activate(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    mut session: Session,
    form: FormSubmission,
) -> Response {
    let Some(password) = form.field(PASSWORD_FIELD) else {
        return missing_credentials();
    };

    let activation = match state
        .legacy
        .send(form.replay(state.legacy.urls()), Redirects::Manual)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => return proxy_failure(FLOW, &e),
    };

    let outcome = classify(activation.status, activation.location(), None);
    if let Some(account_url) = outcome.redirect_target.as_deref().filter(|_| outcome.succeeded()) {
        let account_page = match fetch_account_page(&state, &form, &activation, account_url).await {
            Ok(html) => html,
            Err(response) => return response,
        };

        let Some(email) = extract_embedded_email(&account_page) else {
            warn!("could not find customer email in legacy account page");
            return (StatusCode::BAD_REQUEST, "Could not find email").into_response();
        };

        match bridge_login(state.identity.as_ref(), &outcome, email, &password).await {
            BridgeOutcome::Authenticated(token) => {
                if let Err(e) = session.set_customer_token(&token) {
                    warn!(error = %e, "failed to store access token");
                    session.clear_customer_token();
                } else {
                    info!("activated customer authenticated on both storefronts");
                }
            }
            BridgeOutcome::PartialFailure(_) => {
                session.clear_customer_token();
                return text_with_session(
                    StatusCode::BAD_REQUEST,
                    "Could not authenticate user".to_owned(),
                    session,
                );
            }
            BridgeOutcome::LegacyDeclined(_) => {}
        }
    }

    let location = edge_location(state.legacy.urls(), activation.location(), &origin);
    redirect_response(&activation, &location, Some(session))
}

/// Second hop: load the account page as the freshly activated customer.
async fn fetch_account_page(
    state: &AppState,
    form: &FormSubmission,
    activation: &UpstreamResponse,
    account_url: &str,
) -> Result<String, Response> {
    let mut headers = forward_headers(&form.headers);
    headers.remove(header::CONTENT_TYPE);
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    match HeaderValue::from_str(&activation.cookie_header()) {
        Ok(cookie) => {
            headers.insert(header::COOKIE, cookie);
        }
        Err(_) => {
            headers.remove(header::COOKIE);
        }
    }

    let request = UpstreamRequest {
        method: Method::GET,
        url: state.legacy.urls().resolve(account_url),
        headers,
        body: None,
    };

    let page = state
        .legacy
        .send(request, Redirects::Follow)
        .await
        .map_err(|e| proxy_failure(FLOW, &e))?;
    page.text().map_err(|e| proxy_failure(FLOW, &e))
}
