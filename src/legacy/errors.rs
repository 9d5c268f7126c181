//! Error types for the legacy storefront client.

#[derive(Debug, thiserror::Error)]
pub enum LegacyError {
    #[error("failed to build legacy HTTP client")]
    Client(#[source] reqwest::Error),
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("legacy storefront unreachable ({url}): {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read legacy response body ({url}): {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode {encoding} response body: {source}")]
    Decode {
        encoding: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported content-encoding {0:?}")]
    UnsupportedEncoding(String),
}

impl LegacyError {
    /// True when the upstream could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, LegacyError::Transport { .. })
    }
}
