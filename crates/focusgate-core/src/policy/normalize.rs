//! Hostname normalization for list matching.
//!
//! Anything a user or browser hands us -- a full URL, a bare domain, or
//! something that does not parse at all -- is reduced to a lower-case,
//! scheme-less, `www.`-stripped host. Unparseable input falls back to string
//! stripping; nothing is ever rejected here.

use url::Url;

/// Prefixes of browser-internal pages that never belong on a site list.
const INTERNAL_PAGE_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "brave://",
    "moz-extension://",
    "about:",
];

/// Upper bound on normalization passes; real inputs settle in two or three.
const MAX_PASSES: usize = 8;

/// Reduce a URL or host string to the form stored in the site lists.
///
/// `normalize(&normalize(x)) == normalize(x)` for every input.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_once(raw);
    for _ in 0..MAX_PASSES {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Whether `raw` points at a browser-internal page.
pub fn is_internal_page(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    INTERNAL_PAGE_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

fn normalize_once(raw: &str) -> String {
    let trimmed = raw.trim();
    let host = match Url::parse(trimmed) {
        Ok(url) => match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => strip_fallback(trimmed).to_string(),
        },
        Err(_) => strip_fallback(trimmed).to_string(),
    };
    let lowered = host.to_lowercase();
    strip_www(lowered.trim()).to_string()
}

/// Best-effort host extraction: drop a leading `scheme://`, keep what comes
/// before the first `/`.
fn strip_fallback(raw: &str) -> &str {
    let rest = match raw.split_once("://") {
        Some((scheme, rest)) if is_scheme(scheme) => rest,
        _ => raw,
    };
    rest.split('/').next().unwrap_or_default()
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn strip_www(mut host: &str) -> &str {
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    host
}
