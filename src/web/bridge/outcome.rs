//! Classification of legacy auth responses and the combined legacy + edge result.
//!
//! The legacy storefront has no structured status contract for its customer
//! forms: success and failure both answer `302`, and only the `Location`
//! target tells them apart (a failed login redirects back to the login form).
//! All of that guesswork lives here.

use http::StatusCode;
use tracing::{info, warn};

use crate::identity::{CustomerAccessToken, IdentityProvider, LoginError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeReason {
    /// `302` to somewhere other than the submitted form.
    Confirmed,
    /// No usable success signal (non-302, or a 302 without `Location`).
    Ambiguous,
    /// `302` straight back to the submitted form.
    ExplicitFailure,
}

/// What the legacy storefront said about a replayed auth form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub reason: OutcomeReason,
    pub redirect_target: Option<String>,
}

impl AuthOutcome {
    pub fn succeeded(&self) -> bool {
        self.reason == OutcomeReason::Confirmed
    }
}

/// Classify a legacy response from its status and `Location`.
///
/// `form_segment` is the last path segment of the flow's own form page
/// (`"login"`, `"register"`). A redirect whose final segment matches it means
/// the form was re-rendered with errors. `None` accepts any redirect target.
pub fn classify(
    status: StatusCode,
    location: Option<&str>,
    form_segment: Option<&str>,
) -> AuthOutcome {
    let redirect_target = location.map(str::to_owned);

    let reason = match location {
        _ if status != StatusCode::FOUND => OutcomeReason::Ambiguous,
        None => OutcomeReason::Ambiguous,
        Some(location) => match form_segment {
            Some(segment) if last_path_segment(location).eq_ignore_ascii_case(segment) => {
                OutcomeReason::ExplicitFailure
            }
            _ => OutcomeReason::Confirmed,
        },
    };

    AuthOutcome {
        reason,
        redirect_target,
    }
}

/// Final non-empty path segment of an absolute or relative URL.
fn last_path_segment(location: &str) -> &str {
    let without_fragment = location.split('#').next().unwrap_or(location);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    let path = match path.find("://") {
        Some(idx) => {
            let after_scheme = &path[idx + 3..];
            after_scheme.find('/').map_or("", |slash| &after_scheme[slash..])
        }
        None => path,
    };
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Result of bridging a legacy auth outcome into the edge frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The legacy storefront did not confirm the credentials; the edge was not asked.
    LegacyDeclined(AuthOutcome),
    /// Both sides accepted the credentials.
    Authenticated(CustomerAccessToken),
    /// The legacy storefront accepted the credentials but the edge frontend did not.
    /// The two sides now disagree about whether the customer is logged in.
    PartialFailure(LoginError),
}

/// Log the customer into the edge frontend if, and only if, the legacy side confirmed.
pub async fn bridge_login(
    identity: &dyn IdentityProvider,
    outcome: &AuthOutcome,
    email: &str,
    password: &str,
) -> BridgeOutcome {
    if !outcome.succeeded() {
        info!(reason = ?outcome.reason, location = ?outcome.redirect_target, "legacy auth not confirmed");
        return BridgeOutcome::LegacyDeclined(outcome.clone());
    }

    match identity.login(email, password).await {
        Ok(token) => BridgeOutcome::Authenticated(token),
        Err(e) => {
            warn!(status = e.status.as_u16(), error = %e, "legacy auth succeeded but edge login failed");
            BridgeOutcome::PartialFailure(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_elsewhere_is_confirmed() {
        let outcome = classify(
            StatusCode::FOUND,
            Some("https://legacy.example.com/account"),
            Some("login"),
        );
        assert!(outcome.succeeded());
        assert_eq!(
            outcome.redirect_target.as_deref(),
            Some("https://legacy.example.com/account")
        );
    }

    #[test]
    fn redirect_back_to_form_is_failure() {
        let outcome = classify(
            StatusCode::FOUND,
            Some("https://legacy.example.com/account/login"),
            Some("login"),
        );
        assert_eq!(outcome.reason, OutcomeReason::ExplicitFailure);
        assert!(!outcome.succeeded());
    }

    #[test]
    fn form_match_ignores_query_and_trailing_slash() {
        for location in [
            "/account/register/",
            "/account/register?errors=1",
            "https://legacy.example.com/account/register#form",
        ] {
            let outcome = classify(StatusCode::FOUND, Some(location), Some("register"));
            assert_eq!(outcome.reason, OutcomeReason::ExplicitFailure, "{location}");
        }
    }

    #[test]
    fn root_redirect_is_confirmed() {
        let outcome = classify(
            StatusCode::FOUND,
            Some("https://legacy.example.com/"),
            Some("register"),
        );
        assert!(outcome.succeeded());
    }

    #[test]
    fn non_redirect_is_ambiguous() {
        let outcome = classify(StatusCode::OK, None, Some("login"));
        assert_eq!(outcome.reason, OutcomeReason::Ambiguous);
        let outcome = classify(StatusCode::SEE_OTHER, Some("/account"), Some("login"));
        assert_eq!(outcome.reason, OutcomeReason::Ambiguous);
    }

    #[test]
    fn redirect_without_location_is_ambiguous() {
        assert_eq!(
            classify(StatusCode::FOUND, None, None).reason,
            OutcomeReason::Ambiguous
        );
    }

    #[test]
    fn any_target_accepted_without_form_segment() {
        let outcome = classify(StatusCode::FOUND, Some("/account/activate/1/abc"), None);
        assert!(outcome.succeeded());
    }

    #[test]
    fn last_segment_extraction() {
        assert_eq!(last_path_segment("https://legacy.example.com"), "");
        assert_eq!(last_path_segment("https://legacy.example.com/account"), "account");
        assert_eq!(last_path_segment("/account/login?x=/y"), "login");
    }
}
