//! Site adapters.
//!
//! A [`SiteAdapter`] knows where a site puts its search results, links,
//! dates, prices and detail texts. Everything else (validation flow,
//! error classification, keyword matching) is shared and lives in
//! [`template`]. The [`SiteRegistry`] maps filter URLs to adapters and
//! owns one fetcher per site.

pub mod keywords;
mod kleinanzeigen;
mod registry;
pub mod template;
mod wg_gesucht;
mod zypresse;

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::SiteDescriptor;
use crate::utils::normalize_whitespace;

pub use kleinanzeigen::Kleinanzeigen;
pub use registry::{SiteContext, SiteRegistry, default_adapters};
pub use wg_gesucht::WgGesucht;
pub use zypresse::Zypresse;

/// Site-specific extraction steps.
///
/// Implementors only locate data; classification of failures and the
/// order of steps are handled by [`template`].
pub trait SiteAdapter: Send + Sync {
    fn descriptor(&self) -> &SiteDescriptor;

    /// Check that a search page has the expected structure.
    fn validate_page(&self, _doc: &Html) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Result entries of a search page, in page order.
    fn result_nodes<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>>;

    /// Whether an entry is a placement that should be ignored.
    fn should_skip(&self, _node: ElementRef<'_>) -> bool {
        false
    }

    /// Absolute detail-page URL of an entry.
    fn parse_link(&self, node: ElementRef<'_>) -> Option<String>;

    fn parse_date(&self, node: ElementRef<'_>) -> Option<String>;

    fn parse_price(&self, node: ElementRef<'_>) -> Option<String>;

    /// Whether every result entry is expected to show a date.
    fn expects_date(&self) -> bool {
        true
    }

    /// Whether every result entry is expected to show a price.
    fn expects_price(&self) -> bool {
        true
    }

    /// Absolute URLs of further result pages. Empty if unknown.
    fn additional_pages(&self, doc: &Html) -> Vec<String>;

    /// Whether a detail page says the listing was taken down.
    fn listing_gone(&self, _doc: &Html) -> bool {
        false
    }

    fn parse_title(&self, doc: &Html) -> Option<String>;

    fn parse_description(&self, doc: &Html) -> Option<String>;
}

/// Parse a CSS selector string.
pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Whitespace-normalized text of an element, `None` if blank.
///
/// Text nodes are joined with a space so `<br>`-separated lines stay apart.
pub(crate) fn element_text(el: ElementRef<'_>) -> Option<String> {
    non_blank(normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
}

/// Text of the first element under `doc` matching `selector`.
pub(crate) fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector).next().and_then(element_text)
}

/// Text of the first element under `node` matching `selector`.
pub(crate) fn first_text_in(node: ElementRef<'_>, selector: &Selector) -> Option<String> {
    node.select(selector).next().and_then(element_text)
}

/// `href` of the first match, resolved against `base_url`.
pub(crate) fn first_href(node: ElementRef<'_>, selector: &Selector, base_url: &str) -> Option<String> {
    node.select(selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .and_then(|href| crate::utils::resolve(base_url, href))
}

fn non_blank(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector("div.class").is_ok());
        assert!(parse_selector("a[href]").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(matches!(
            parse_selector("[[invalid"),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn test_text_helpers() {
        let doc = Html::parse_document(
            r#"<div id="x"><p>  Hello
                <b>world</b> </p><p>   </p><a href="/a/1">one</a></div>"#,
        );
        let p = parse_selector("p").unwrap();
        assert_eq!(first_text(&doc, &p).as_deref(), Some("Hello world"));

        let root = doc.select(&parse_selector("#x").unwrap()).next().unwrap();
        let a = parse_selector("a").unwrap();
        assert_eq!(
            first_href(root, &a, "https://site.example").as_deref(),
            Some("https://site.example/a/1")
        );
        assert_eq!(first_text_in(root, &parse_selector("span").unwrap()), None);
    }
}
