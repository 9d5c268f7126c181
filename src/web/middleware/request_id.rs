//! Request IDs that follow a request through the gateway and on to the legacy storefront.
//!
//! An inbound `X-Request-Id` from the CDN in front of the edge is reused when it
//! looks sane; otherwise a ULID is minted. The resolved ID is written back into
//! the request headers, so every legacy call made while handling the request
//! (passthrough, page render, form replay, activation second hop) carries it,
//! and it is echoed on the response.
//!
//! Each request gets a span tagged with the gateway surface that will handle it.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

static REQUEST_ID: &str = "x-request-id";

/// Inbound IDs longer than this are replaced rather than trusted.
const MAX_INBOUND_LEN: usize = 128;

/// Which part of the gateway a path lands on, for log filtering.
fn surface(path: &str) -> &'static str {
    match path {
        "/healthz" => "health",
        "/account/logout" => "logout",
        p if p == "/account" || p.starts_with("/account/") => "account",
        _ => "passthrough",
    }
}

/// Reuse a well-formed inbound ID, else mint a ULID.
fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_INBOUND_LEN)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string())
}

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let req_id = resolve_request_id(req.headers());
        let header_value = HeaderValue::from_str(&req_id).ok();
        if let Some(value) = &header_value {
            req.headers_mut().insert(REQUEST_ID, value.clone());
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let surface = surface(&path);
        let span = tracing::info_span!(
            "request",
            req_id = %req_id,
            method = %method,
            path = %path,
            surface
        );
        let start = Instant::now();

        let future = self.inner.call(req);

        Box::pin(
            async move {
                let mut result = future.await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        let location = response
                            .headers()
                            .get(header::LOCATION)
                            .and_then(|v| v.to_str().ok());
                        match status {
                            200..=399 => {
                                tracing::debug!(status, location, duration_ms, "Response");
                            }
                            400..=499 => {
                                tracing::info!(status, duration_ms, "Response");
                            }
                            _ => {
                                tracing::warn!(status, duration_ms, "Response");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, duration_ms, "Request failed");
                    }
                }

                if let Ok(ref mut response) = result
                    && let Some(value) = header_value
                {
                    response.headers_mut().insert(REQUEST_ID, value);
                }

                result
            }
            .instrument(span),
        )
    }
}
