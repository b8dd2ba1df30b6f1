// src/sites/kleinanzeigen.rs

//! kleinanzeigen.de (formerly eBay Kleinanzeigen).

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::{SiteDescriptor, SiteLimits};
use crate::sites::{SiteAdapter, first_href, first_text, first_text_in, parse_selector};

/// Served instead of real markup once the request budget is exceeded.
const OBFUSCATED_HTML: &str = r#"<html><head><meta charset="utf-8"><script>"#;

const LISTING_GONE: &str = "Die gewünschte Anzeige ist nicht mehr verfügbar";

/// The site tolerates 40 requests per 5 minutes, then starts obfuscating.
const LIMITS: SiteLimits = SiteLimits::new(Duration::from_secs(5 * 60), 40);

pub struct Kleinanzeigen {
    site: SiteDescriptor,
    results: Selector,
    promoted: Selector,
    link: Selector,
    date: Selector,
    price: Selector,
    pages: Selector,
    title: Selector,
    description: Selector,
}

impl Kleinanzeigen {
    pub fn new() -> Result<Self> {
        Ok(Self {
            site: SiteDescriptor {
                key: "kleinanzeigen",
                name: "Kleinanzeigen",
                base_url: "https://www.kleinanzeigen.de",
                url_fragment: "kleinanzeigen.de",
                limits: LIMITS,
                invalid_html: Some(OBFUSCATED_HTML),
            },
            results: parse_selector("ul#srchrslt-adtable article.aditem")?,
            // Pro shop badges and paid top ads
            promoted: parse_selector(r#".badge-hint-pro-small-srp, i[class*="icon-feature-topad"]"#)?,
            link: parse_selector("div.aditem-main h2 a[href]")?,
            date: parse_selector(".aditem-main--top--right")?,
            price: parse_selector("p.aditem-main--middle--price-shipping--price")?,
            pages: parse_selector("a.pagination-page[href]")?,
            title: parse_selector("h1#viewad-title")?,
            description: parse_selector("p#viewad-description-text")?,
        })
    }
}

impl SiteAdapter for Kleinanzeigen {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.site
    }

    fn result_nodes<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&self.results).collect()
    }

    fn should_skip(&self, node: ElementRef<'_>) -> bool {
        node.select(&self.promoted).next().is_some()
    }

    fn parse_link(&self, node: ElementRef<'_>) -> Option<String> {
        first_href(node, &self.link, self.site.base_url)
    }

    fn parse_date(&self, node: ElementRef<'_>) -> Option<String> {
        first_text_in(node, &self.date)
    }

    fn parse_price(&self, node: ElementRef<'_>) -> Option<String> {
        first_text_in(node, &self.price)
    }

    // Top-right corner is empty for some listings
    fn expects_date(&self) -> bool {
        false
    }

    fn additional_pages(&self, doc: &Html) -> Vec<String> {
        doc.select(&self.pages)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| !href.trim().is_empty())
            .filter_map(|href| crate::utils::resolve(self.site.base_url, href))
            .collect()
    }

    fn listing_gone(&self, doc: &Html) -> bool {
        doc.html().contains(LISTING_GONE)
    }

    fn parse_title(&self, doc: &Html) -> Option<String> {
        first_text(doc, &self.title)
    }

    fn parse_description(&self, doc: &Html) -> Option<String> {
        first_text(doc, &self.description)
    }
}
