//! Process configuration, loaded once from the environment.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Raw configuration as extracted from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Base URL of the legacy storefront, e.g. `https://legacy-shop.example.com`.
    #[serde(deserialize_with = "deserialize_base_url")]
    pub legacy_store_url: String,
    /// Fixed public origin of the edge frontend. Resolved per request when unset.
    #[serde(default, deserialize_with = "deserialize_optional_base_url")]
    pub public_origin: Option<String>,
    #[serde(default = "default_legacy_user_agent")]
    pub legacy_user_agent: String,

    pub storefront_api_url: String,
    pub storefront_api_token: String,

    pub session_secret: String,
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,
    #[serde(default = "default_true")]
    pub session_cookie_secure: bool,

    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    #[serde(default = "default_true")]
    pub remove_noindex: bool,
    #[serde(default = "default_true")]
    pub rewrite_canonical: bool,
    #[serde(default)]
    pub strip_client_redirects: bool,

    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

/// Request-handling policy. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPolicy {
    pub cache_control: String,
    pub remove_noindex_tags: bool,
    pub rewrite_canonical_links: bool,
    pub strip_client_redirect_scripts: bool,
}

impl Default for ProxyPolicy {
    fn default() -> Self {
        Self {
            cache_control: default_cache_control(),
            remove_noindex_tags: true,
            rewrite_canonical_links: true,
            strip_client_redirect_scripts: false,
        }
    }
}

impl Config {
    pub fn policy(&self) -> ProxyPolicy {
        ProxyPolicy {
            cache_control: self.cache_control.clone(),
            remove_noindex_tags: self.remove_noindex,
            rewrite_canonical_links: self.rewrite_canonical,
            strip_client_redirect_scripts: self.strip_client_redirects,
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_legacy_user_agent() -> String {
    "Hydrogen".to_owned()
}

fn default_session_cookie_name() -> String {
    "session".to_owned()
}

fn default_cache_control() -> String {
    "public, max-age=3600, stale-while-revalidate=86400".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn deserialize_base_url<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim().trim_end_matches('/');
    url::Url::parse(trimmed).map_err(serde::de::Error::custom)?;
    Ok(trimmed.to_owned())
}

fn deserialize_optional_base_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            let trimmed = value.trim_end_matches('/');
            url::Url::parse(trimmed).map_err(serde::de::Error::custom)?;
            Ok(Some(trimmed.to_owned()))
        }
    }
}

/// Accepts bare integers as seconds, or human durations like `500ms`, `10s`, `1m`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    let parsed = fundu::DurationParser::with_all_time_units()
        .parse(text)
        .map_err(|e| format!("invalid duration {text:?}: {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration {text:?}: {e}"))
}
