//! Translation between legacy-origin URLs and edge-origin URLs.

/// Maps paths onto the legacy base URL and back onto the edge origin.
///
/// Translation is plain substring replacement of the configured base; strings
/// that do not contain the base pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTranslator {
    legacy_base: String,
}

impl UrlTranslator {
    pub fn new(legacy_base: impl Into<String>) -> Self {
        let legacy_base: String = legacy_base.into();
        Self {
            legacy_base: legacy_base.trim_end_matches('/').to_owned(),
        }
    }

    pub fn legacy_base(&self) -> &str {
        &self.legacy_base
    }

    /// `"/account?x=1"` -> `"https://legacy.example.com/account?x=1"`.
    pub fn to_legacy(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{path_and_query}", self.legacy_base)
        } else {
            format!("{}/{path_and_query}", self.legacy_base)
        }
    }

    /// Replace the first occurrence of the legacy base with `origin`.
    pub fn to_edge(&self, url: &str, origin: &str) -> String {
        url.replacen(&self.legacy_base, origin, 1)
    }

    /// Strip the legacy base, leaving an origin-relative path and query.
    pub fn to_relative(&self, url: &str) -> String {
        self.to_edge(url, "")
    }

    /// Resolve a possibly relative `Location` against the legacy base.
    pub fn resolve(&self, location: &str) -> String {
        if location.starts_with('/') && !location.starts_with("//") {
            self.to_legacy(location)
        } else {
            location.to_owned()
        }
    }
}

/// Drop a trailing `?sid=...` session marker that the legacy address forms append.
pub fn strip_sid(location: &str) -> &str {
    match location.split_once("?sid") {
        Some((head, _)) => head,
        None => location,
    }
}
