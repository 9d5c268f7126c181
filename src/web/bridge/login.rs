//! Login and registration: both carry credentials the edge frontend can reuse.

use axum::extract::State;
use axum::response::Response;
use tracing::{error, info};

use super::outcome::{BridgeOutcome, bridge_login, classify};
use super::{
    EMAIL_FIELD, FormSubmission, PASSWORD_FIELD, edge_location, missing_credentials,
    proxy_failure, redirect_response, text_with_session,
};
use crate::legacy::Redirects;
use crate::session::Session;
use crate::state::AppState;
use crate::web::origin::RequestOrigin;

/// A legacy form that authenticates the customer on success.
#[derive(Debug, Clone, Copy)]
struct CredentialFlow {
    name: &'static str,
    /// Last path segment of the form page the legacy storefront re-renders on error.
    form_segment: &'static str,
}

const LOGIN: CredentialFlow = CredentialFlow {
    name: "login post",
    form_segment: "login",
};

/// The legacy register form posts to `/account`, not `/account/register`.
const REGISTER: CredentialFlow = CredentialFlow {
    name: "register post",
    form_segment: "register",
};

/// `POST /account/login`
pub async fn login(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    session: Session,
    form: FormSubmission,
) -> Response {
    credential_flow(LOGIN, &state, &origin, session, form).await
}

/// `POST /account`
pub async fn register(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    session: Session,
    form: FormSubmission,
) -> Response {
    credential_flow(REGISTER, &state, &origin, session, form).await
}

async fn credential_flow(
    flow: CredentialFlow,
    state: &AppState,
    origin: &str,
    mut session: Session,
    form: FormSubmission,
) -> Response {
    let (Some(email), Some(password)) = (form.field(EMAIL_FIELD), form.field(PASSWORD_FIELD))
    else {
        return missing_credentials();
    };

    let upstream = match state
        .legacy
        .send(form.replay(state.legacy.urls()), Redirects::Manual)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => return proxy_failure(flow.name, &e),
    };

    let outcome = classify(upstream.status, upstream.location(), Some(flow.form_segment));
    match bridge_login(state.identity.as_ref(), &outcome, &email, &password).await {
        BridgeOutcome::Authenticated(token) => {
            if let Err(e) = session.set_customer_token(&token) {
                error!(error = %e, "failed to store access token");
                session.clear_customer_token();
            } else {
                info!(flow = flow.name, "customer authenticated on both storefronts");
            }
        }
        BridgeOutcome::PartialFailure(e) => {
            session.clear_customer_token();
            return text_with_session(e.status, e.message, session);
        }
        BridgeOutcome::LegacyDeclined(_) => {}
    }

    let location = edge_location(state.legacy.urls(), upstream.location(), origin);
    redirect_response(&upstream, &location, Some(session))
}
