//! Password recovery: replayed as-is, only the redirect is translated.

use axum::extract::State;
use axum::response::Response;

use super::{FormSubmission, edge_location, proxy_failure, redirect_response};
use crate::legacy::Redirects;
use crate::session::Session;
use crate::state::AppState;
use crate::web::origin::RequestOrigin;

/// `POST /account/recover`
pub async fn recover(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    session: Session,
    form: FormSubmission,
) -> Response {
    let upstream = match state
        .legacy
        .send(form.replay(state.legacy.urls()), Redirects::Manual)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => return proxy_failure("recover post", &e),
    };

    let location = edge_location(state.legacy.urls(), upstream.location(), &origin);
    redirect_response(&upstream, &location, Some(session))
}
