// src/sites/wg_gesucht.rs

//! wg-gesucht.de shared flat and apartment offers.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::{SiteDescriptor, SiteLimits};
use crate::sites::{SiteAdapter, element_text, first_href, first_text, parse_selector};

/// Marker in the `onclick` of premium placements. They lead to a seller
/// page with many offers instead of a single listing.
const PREMIUM_MARKER: &str = "premium sticky ad";

pub struct WgGesucht {
    site: SiteDescriptor,
    cards: Selector,
    link: Selector,
    spans: Selector,
    bold: Selector,
    title: Selector,
    address: Selector,
    description: Selector,
}

impl WgGesucht {
    pub fn new() -> Result<Self> {
        Ok(Self {
            site: SiteDescriptor {
                key: "wg-gesucht",
                name: "WG-Gesucht",
                base_url: "https://www.wg-gesucht.de",
                url_fragment: "wg-gesucht.de",
                limits: SiteLimits::new(Duration::from_secs(5 * 60), 40),
                invalid_html: None,
            },
            cards: parse_selector("div.wgg_card.offer_list_item")?,
            link: parse_selector("h3 a[href]")?,
            spans: parse_selector("div span")?,
            bold: parse_selector("div b")?,
            title: parse_selector("h1#sliderTopTitle")?,
            address: parse_selector("div.col-sm-4.mb10")?,
            description: parse_selector("#freitext_0_content")?,
        })
    }
}

impl SiteAdapter for WgGesucht {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.site
    }

    fn validate_page(&self, doc: &Html) -> std::result::Result<(), String> {
        match doc.select(&self.cards).next() {
            Some(_) => Ok(()),
            None => Err("no offer cards on page".into()),
        }
    }

    fn result_nodes<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&self.cards).collect()
    }

    fn should_skip(&self, node: ElementRef<'_>) -> bool {
        node.value()
            .attr("onclick")
            .is_some_and(|js| js.contains(PREMIUM_MARKER))
    }

    fn parse_link(&self, node: ElementRef<'_>) -> Option<String> {
        first_href(node, &self.link, self.site.base_url)
    }

    fn parse_date(&self, node: ElementRef<'_>) -> Option<String> {
        node.select(&self.spans)
            .filter_map(element_text)
            .find(|text| text.contains("Online:"))
    }

    fn parse_price(&self, node: ElementRef<'_>) -> Option<String> {
        node.select(&self.bold)
            .filter_map(element_text)
            .find(|text| text.contains('€'))
    }

    /// Pagination is rendered client-side.
    fn additional_pages(&self, _doc: &Html) -> Vec<String> {
        Vec::new()
    }

    fn parse_title(&self, doc: &Html) -> Option<String> {
        first_text(doc, &self.title)
    }

    /// Address block followed by the free text, either may be missing.
    fn parse_description(&self, doc: &Html) -> Option<String> {
        let parts: Vec<String> = [first_text(doc, &self.address), first_text(doc, &self.description)]
            .into_iter()
            .flatten()
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n"))
    }
}
