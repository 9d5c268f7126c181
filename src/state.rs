//! Application state shared by every request handler.

use std::sync::Arc;

use crate::config::ProxyPolicy;
use crate::identity::IdentityProvider;
use crate::legacy::LegacyClient;
use crate::session::SessionCodec;

#[derive(Clone)]
pub struct AppState {
    pub legacy: LegacyClient,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: SessionCodec,
    pub policy: Arc<ProxyPolicy>,
    /// Fixed edge origin; resolved from request headers when `None`.
    pub public_origin: Option<String>,
    /// User-agent presented to the legacy storefront on page renders.
    pub legacy_user_agent: String,
}

impl AppState {
    pub fn new(
        legacy: LegacyClient,
        identity: Arc<dyn IdentityProvider>,
        sessions: SessionCodec,
        policy: ProxyPolicy,
        public_origin: Option<String>,
        legacy_user_agent: String,
    ) -> Self {
        Self {
            legacy,
            identity,
            sessions,
            policy: Arc::new(policy),
            public_origin,
            legacy_user_agent,
        }
    }
}
