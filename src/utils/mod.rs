//! Utility functions and helpers.

pub mod http;

use std::time::Duration;

use rand::{Rng, rng};
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uniformly random duration in `low..=high` at millisecond resolution.
pub fn jitter(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let low_ms = low.as_millis() as u64;
    let high_ms = high.as_millis() as u64;
    Duration::from_millis(rng().random_range(low_ms..=high_ms))
}
