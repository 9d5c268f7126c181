//! Address book mutations. No session changes, only redirect translation.

use axum::extract::State;
use axum::response::Response;

use super::{FormSubmission, edge_location, proxy_failure, redirect_response};
use crate::legacy::Redirects;
use crate::legacy::urls::strip_sid;
use crate::state::AppState;
use crate::web::origin::RequestOrigin;

/// `POST /account/addresses`
pub async fn add_address(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    form: FormSubmission,
) -> Response {
    address_flow("addresses post", &state, &origin, form).await
}

/// `POST /account/addresses/{id}` (update, or delete via `_method=delete`)
pub async fn update_address(
    State(state): State<AppState>,
    RequestOrigin(origin): RequestOrigin,
    form: FormSubmission,
) -> Response {
    address_flow("address post", &state, &origin, form).await
}

async fn address_flow(
    name: &'static str,
    state: &AppState,
    origin: &str,
    form: FormSubmission,
) -> Response {
    let upstream = match state
        .legacy
        .send(form.replay(state.legacy.urls()), Redirects::Manual)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => return proxy_failure(name, &e),
    };

    let location = edge_location(state.legacy.urls(), upstream.location().map(strip_sid), origin);
    redirect_response(&upstream, &location, None)
}
