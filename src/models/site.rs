// src/models/site.rs

//! Constant per-site settings.

use std::time::Duration;

/// Request budget of one site: at most `quota` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteLimits {
    pub window: Duration,
    pub quota: usize,
}

impl SiteLimits {
    pub const fn new(window: Duration, quota: usize) -> Self {
        Self { window, quota }
    }
}

/// Identity and fixed configuration of a site adapter.
#[derive(Debug, Clone)]
pub struct SiteDescriptor {
    /// Registry key; one fetcher and rate limiter exist per key
    pub key: &'static str,

    /// Display name
    pub name: &'static str,

    /// Origin used to absolutize relative links
    pub base_url: &'static str,

    /// Filters whose URL contains this fragment belong to the site
    pub url_fragment: &'static str,

    pub limits: SiteLimits,

    /// Prefix of bodies the site serves instead of real markup (e.g. JS obfuscation)
    pub invalid_html: Option<&'static str>,
}

impl SiteDescriptor {
    /// Whether a filter URL targets this site.
    pub fn matches_url(&self, url: &str) -> bool {
        url.contains(self.url_fragment)
    }

    /// Whether a response body is the site's invalid/obfuscated placeholder.
    pub fn is_invalid_html(&self, body: &str) -> bool {
        self.invalid_html
            .is_some_and(|marker| body.trim_start().starts_with(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> SiteDescriptor {
        SiteDescriptor {
            key: "example",
            name: "Example",
            base_url: "https://www.example.com",
            url_fragment: "example.com",
            limits: SiteLimits::new(Duration::from_secs(300), 40),
            invalid_html: Some("<html><head><script>"),
        }
    }

    #[test]
    fn test_matches_url() {
        let site = descriptor();
        assert!(site.matches_url("https://www.example.com/s-search/k0"));
        assert!(!site.matches_url("https://www.other.org/"));
    }

    #[test]
    fn test_invalid_html_prefix() {
        let site = descriptor();
        assert!(site.is_invalid_html("  <html><head><script>var x;</script>"));
        assert!(!site.is_invalid_html("<html><body><script>"));

        let lenient = SiteDescriptor {
            invalid_html: None,
            ..descriptor()
        };
        assert!(!lenient.is_invalid_html("<html><head><script>"));
    }
}
