//! Pattern-based rewriting of legacy storefront HTML.
//!
//! Matching is deliberately shallow: a handful of regexes over the raw text,
//! never a DOM parse. Anything that does not match (unclosed `<script>`, odd
//! attribute orders) is left exactly as the legacy storefront sent it.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::config::ProxyPolicy;
use crate::legacy::UrlTranslator;

const MONORAIL_SHOP_DOMAIN: &str = r#""monorailRegion":"shop_domain""#;
const MONORAIL_GLOBAL: &str = r#""monorailRegion":"global""#;

/// Robots meta, canonical link, analytics region marker, inline script.
static STRUCTURAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)(?P<meta><meta\b[^>]*name="robots"[^>]*content="noindex[^"]*"[^>]*>)"#,
        r#"|(?P<link><link\b[^>]*rel="canonical"[^>]*href="[^"]*"[^>]*>)"#,
        r#"|(?P<monorail>"monorailRegion":"shop_domain")"#,
        r#"|(?P<script><script\b.*?</script>)"#,
    ))
    .unwrap()
});

static CLIENT_REDIRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.location\.replace\([^)]*\);?").unwrap());

static SOFT_404_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>.*404 Not Found.*</title>").unwrap());

static EMBEDDED_EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""email":\s*"(.*?)""#).unwrap());

/// Per-request inputs to [`rewrite_html`].
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub urls: &'a UrlTranslator,
    /// Resolved edge origin, e.g. `https://shop.example.com`.
    pub origin: &'a str,
    /// The path and query of the page being rendered, e.g. `/account?view=orders`.
    pub path_and_query: &'a str,
}

/// Rewrite a legacy page so it reads as if served by the edge origin.
///
/// Structural rules run first in a single pass. The page's own absolute legacy
/// URL is then replaced with its relative form.
pub fn rewrite_html(html: &str, page: &PageContext<'_>, policy: &ProxyPolicy) -> String {
    let structural = STRUCTURAL_RE.replace_all(html, |caps: &Captures<'_>| {
        if let Some(meta) = caps.name("meta") {
            return if policy.remove_noindex_tags {
                String::new()
            } else {
                meta.as_str().to_owned()
            };
        }
        if let Some(link) = caps.name("link") {
            return if policy.rewrite_canonical_links {
                page.urls.to_edge(link.as_str(), page.origin)
            } else {
                link.as_str().to_owned()
            };
        }
        if caps.name("monorail").is_some() {
            return MONORAIL_GLOBAL.to_owned();
        }
        if let Some(script) = caps.name("script") {
            // The region marker usually lives inside a script block, which the
            // alternation consumes whole.
            let script = script.as_str().replace(MONORAIL_SHOP_DOMAIN, MONORAIL_GLOBAL);
            return if policy.strip_client_redirect_scripts {
                CLIENT_REDIRECT_RE.replace_all(&script, "").into_owned()
            } else {
                script
            };
        }
        caps[0].to_owned()
    });

    let page_legacy_url = page.urls.to_legacy(page.path_and_query);
    structural.replace(&page_legacy_url, page.path_and_query)
}

/// The legacy storefront answers some missing pages with `200` and a "404 Not Found" title.
pub fn is_soft_not_found(html: &str) -> bool {
    SOFT_404_RE.is_match(html)
}

/// Pull the customer email out of the account page's inline init data
/// (`"email": "jane@example.com"`).
///
/// This depends on the legacy theme's script markup. `None` means the markup
/// changed or the page is not a logged-in account page.
pub fn extract_embedded_email(html: &str) -> Option<&str> {
    EMBEDDED_EMAIL_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|email| !email.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "https://legacy.example.com";
    const ORIGIN: &str = "https://shop.example.com";

    fn rewrite(html: &str, path: &str, policy: &ProxyPolicy) -> String {
        let urls = UrlTranslator::new(LEGACY);
        let page = PageContext {
            urls: &urls,
            origin: ORIGIN,
            path_and_query: path,
        };
        rewrite_html(html, &page, policy)
    }

    fn policy(noindex: bool, canonical: bool, strip: bool) -> ProxyPolicy {
        ProxyPolicy {
            remove_noindex_tags: noindex,
            rewrite_canonical_links: canonical,
            strip_client_redirect_scripts: strip,
            ..ProxyPolicy::default()
        }
    }

    #[test]
    fn removes_noindex_meta_when_enabled() {
        let html = r#"<head><meta name="robots" content="noindex,nofollow"><title>x</title></head>"#;
        let out = rewrite(html, "/account", &policy(true, true, false));
        assert_eq!(out, "<head><title>x</title></head>");
    }

    #[test]
    fn keeps_noindex_meta_when_disabled() {
        let html = r#"<head><meta name="robots" content="noindex"><title>x</title></head>"#;
        let out = rewrite(html, "/account", &policy(false, true, false));
        assert_eq!(out, html);
    }

    #[test]
    fn noindex_match_stays_within_one_tag() {
        let html = concat!(
            r#"<meta charset="utf-8"><meta name="robots" content="noindex">"#,
            r#"<meta name="viewport" content="width=device-width">"#
        );
        let out = rewrite(html, "/", &policy(true, true, false));
        assert_eq!(
            out,
            r#"<meta charset="utf-8"><meta name="viewport" content="width=device-width">"#
        );
    }

    #[test]
    fn rewrites_canonical_link_to_edge_origin() {
        let html = r#"<link rel="canonical" href="https://legacy.example.com/account/login">"#;
        let out = rewrite(html, "/account/login", &policy(true, true, false));
        assert_eq!(
            out,
            r#"<link rel="canonical" href="https://shop.example.com/account/login">"#
        );
    }

    #[test]
    fn canonical_untouched_when_disabled() {
        let html = r#"<link rel="canonical" href="https://legacy.example.com/pages/about">"#;
        let out = rewrite(html, "/account", &policy(true, false, false));
        assert_eq!(out, html);
    }

    #[test]
    fn monorail_region_always_global() {
        let html = r#"<div data-x='{"monorailRegion":"shop_domain"}'></div>"#;
        let out = rewrite(html, "/", &policy(false, false, false));
        assert_eq!(out, r#"<div data-x='{"monorailRegion":"global"}'></div>"#);
    }

    #[test]
    fn monorail_region_inside_script() {
        let html = r#"<script>var cfg = {"monorailRegion":"shop_domain"};</script>"#;
        let out = rewrite(html, "/", &policy(false, false, false));
        assert_eq!(out, r#"<script>var cfg = {"monorailRegion":"global"};</script>"#);
    }

    #[test]
    fn strips_client_redirect_when_enabled() {
        let html = r#"<script>if (a) { window.location.replace("https://x/y"); }</script>"#;
        let out = rewrite(html, "/", &policy(true, true, true));
        assert_eq!(out, "<script>if (a) {  }</script>");
    }

    #[test]
    fn keeps_client_redirect_when_disabled() {
        let html = r#"<script>window.location.replace("/a");</script>"#;
        let out = rewrite(html, "/", &policy(true, true, false));
        assert_eq!(out, html);
    }

    #[test]
    fn unclosed_script_left_alone() {
        let html = r#"<p>hi</p><script>window.location.replace("/a");"#;
        let out = rewrite(html, "/", &policy(true, true, true));
        assert_eq!(out, html);
    }

    #[test]
    fn page_legacy_url_becomes_relative() {
        let html = r#"<form action="https://legacy.example.com/account/login?checkout=1">"#;
        let out = rewrite(html, "/account/login?checkout=1", &policy(true, true, false));
        assert_eq!(out, r#"<form action="/account/login?checkout=1">"#);
    }

    #[test]
    fn blanket_substitution_runs_after_canonical() {
        let html = concat!(
            r#"<link rel="canonical" href="https://legacy.example.com/account">"#,
            r#"<a href="https://legacy.example.com/account">me</a>"#
        );
        let out = rewrite(html, "/account", &policy(true, true, false));
        assert_eq!(
            out,
            concat!(
                r#"<link rel="canonical" href="https://shop.example.com/account">"#,
                r#"<a href="/account">me</a>"#
            )
        );
    }

    #[test]
    fn soft_not_found_title() {
        assert!(is_soft_not_found("<title>\n  404 Not Found\n  &ndash; Shop</title>"));
        assert!(is_soft_not_found("<TITLE>404 not found</TITLE>"));
        assert!(!is_soft_not_found("<title>Account</title><p>404 Not Found</p>"));
    }

    #[test]
    fn extracts_embedded_email() {
        let html = r#"<script>window.initData = { "id": 7, "email": "jane+shop@example.com", "tags": [] };</script>"#;
        assert_eq!(extract_embedded_email(html), Some("jane+shop@example.com"));
    }

    #[test]
    fn missing_or_empty_email() {
        assert_eq!(extract_embedded_email("<p>no data</p>"), None);
        assert_eq!(extract_embedded_email(r#""email": """#), None);
    }
}
