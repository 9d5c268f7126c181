//! HTTP client for the legacy server-rendered storefront.

pub mod errors;
pub mod urls;

use axum::body::Bytes;
use http::{HeaderMap, HeaderName, Method, StatusCode, header};
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::utils::{fmt_duration, log_if_slow};
pub use errors::LegacyError;
pub use urls::UrlTranslator;

/// Connection-scoped headers that never cross the proxy in either direction.
const HOP_BY_HOP: &[HeaderName] = &[
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

const SLOW_UPSTREAM: Duration = Duration::from_secs(2);

/// Whether the transport may follow `3xx` responses on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    Follow,
    /// Hand `3xx` responses back untouched; the `Location` header is the payload.
    Manual,
}

/// An outbound request to the legacy storefront.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// A fully buffered legacy response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    /// `name=value` pairs from every `Set-Cookie`, joined as a `Cookie` header value.
    pub fn cookie_header(&self) -> String {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Body as text, gunzipped first when the upstream compressed it.
    pub fn text(&self) -> Result<String, LegacyError> {
        decode_body(&self.headers, &self.body)
    }
}

/// Legacy storefront client with a redirect-following and a manual transport.
#[derive(Debug, Clone)]
pub struct LegacyClient {
    follow: reqwest::Client,
    manual: reqwest::Client,
    urls: UrlTranslator,
}

impl LegacyClient {
    pub fn new(base_url: &str) -> Result<Self, LegacyError> {
        let follow = reqwest::Client::builder()
            .build()
            .map_err(LegacyError::Client)?;
        let manual = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(LegacyError::Client)?;

        Ok(Self {
            follow,
            manual,
            urls: UrlTranslator::new(base_url),
        })
    }

    pub fn urls(&self) -> &UrlTranslator {
        &self.urls
    }

    /// Send a single request. No retries; the response body is read to completion.
    pub async fn send(
        &self,
        request: UpstreamRequest,
        redirects: Redirects,
    ) -> Result<UpstreamResponse, LegacyError> {
        let client = match redirects {
            Redirects::Follow => &self.follow,
            Redirects::Manual => &self.manual,
        };

        let UpstreamRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let start = Instant::now();
        let mut builder = client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(|source| LegacyError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|source| LegacyError::Body {
            url: url.clone(),
            source,
        })?;

        debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            duration = fmt_duration(start.elapsed()),
            "legacy response"
        );
        log_if_slow(start, SLOW_UPSTREAM, "legacy request");

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Copy inbound headers for forwarding, dropping hop-by-hop headers.
pub fn forward_headers(inbound: &HeaderMap) -> HeaderMap {
    strip_hop_by_hop(inbound)
}

/// Copy upstream response headers for the client, dropping hop-by-hop headers.
///
/// Multi-valued headers (notably `Set-Cookie`) keep every value.
pub fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    strip_hop_by_hop(upstream)
}

fn strip_hop_by_hop(source: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source.iter() {
        if HOP_BY_HOP.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Decode a body according to its `Content-Encoding` and read it as (lossy) UTF-8.
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> Result<String, LegacyError> {
    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match encoding.as_str() {
        "" | "identity" => Ok(String::from_utf8_lossy(body).into_owned()),
        "gzip" | "x-gzip" => {
            let mut decoded = Vec::with_capacity(body.len() * 4);
            flate2::read::GzDecoder::new(body)
                .read_to_end(&mut decoded)
                .map_err(|source| LegacyError::Decode {
                    encoding: encoding.clone(),
                    source,
                })?;
            Ok(String::from_utf8_lossy(&decoded).into_owned())
        }
        other => Err(LegacyError::UnsupportedEncoding(other.to_owned())),
    }
}
