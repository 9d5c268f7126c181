//! Router construction.

use axum::{Router, routing::get};

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{bridge, content, proxy, status};
use tower_http::compression::CompressionLayer;

/// Creates the gateway router.
///
/// Account paths with special semantics are routed explicitly; everything
/// else falls through to the legacy passthrough. A listed path hit with an
/// unsupported method answers 405.
pub fn create_router(app_state: AppState) -> Router {
    let account_router = Router::new()
        .route(
            "/account",
            get(content::render_content).post(bridge::register),
        )
        .route(
            "/account/login",
            get(content::render_content).post(bridge::login),
        )
        .route("/account/register", get(content::render_content))
        .route(
            "/account/activate",
            get(content::render_content).post(bridge::activate),
        )
        .route(
            "/account/activate/{id}/{token}",
            get(content::render_content).post(bridge::activate),
        )
        .route(
            "/account/addresses",
            get(content::render_content).post(bridge::add_address),
        )
        .route(
            "/account/addresses/{id}",
            get(content::render_content).post(bridge::update_address),
        )
        .route(
            "/account/recover",
            get(content::render_content).post(bridge::recover),
        )
        .route("/account/orders/{id}", get(content::render_content))
        .route("/account/logout", get(bridge::logout));

    let router = Router::new()
        .route("/healthz", get(status::health))
        .merge(account_router)
        .fallback(proxy::catch_all)
        .with_state(app_state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        // Bodies that already carry a Content-Encoding (raw legacy bytes) are left alone.
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
    ))
}
