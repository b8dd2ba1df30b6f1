// src/sites/zypresse.rs

//! zypresse.com classifieds.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::{SiteDescriptor, SiteLimits};
use crate::sites::{SiteAdapter, first_href, first_text, first_text_in, parse_selector};

const DETAIL_BODY: &str =
    "#blockContentInner > div:nth-of-type(1) > div > div:nth-of-type(1) > div > div:nth-of-type(2)";

pub struct Zypresse {
    site: SiteDescriptor,
    list: Selector,
    entries: Selector,
    link: Selector,
    date: Selector,
    next_page: Selector,
    title: Selector,
    description: Selector,
}

impl Zypresse {
    pub fn new() -> Result<Self> {
        Ok(Self {
            site: SiteDescriptor {
                key: "zypresse",
                name: "Zypresse",
                base_url: "https://www.zypresse.com",
                url_fragment: "zypresse.com",
                limits: SiteLimits::new(Duration::from_secs(5 * 60), 40),
                invalid_html: None,
            },
            list: parse_selector("ul#listAdlistAd")?,
            entries: parse_selector("ul#listAdlistAd li.listEntryObject-ad")?,
            link: parse_selector("div > div > a[href]")?,
            date: parse_selector("span.date")?,
            next_page: parse_selector("div.pageNaviList a.pageNaviNextLink[href]")?,
            title: parse_selector(&format!("{} > div:nth-of-type(2)", DETAIL_BODY))?,
            description: parse_selector(&format!("{} > div:nth-of-type(3) > div", DETAIL_BODY))?,
        })
    }
}

impl SiteAdapter for Zypresse {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.site
    }

    fn validate_page(&self, doc: &Html) -> std::result::Result<(), String> {
        match doc.select(&self.list).next() {
            Some(_) => Ok(()),
            None => Err("result list missing".into()),
        }
    }

    fn result_nodes<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&self.entries).collect()
    }

    fn parse_link(&self, node: ElementRef<'_>) -> Option<String> {
        first_href(node, &self.link, self.site.base_url)
    }

    fn parse_date(&self, node: ElementRef<'_>) -> Option<String> {
        first_text_in(node, &self.date)
    }

    /// Result pages show no price.
    fn parse_price(&self, _node: ElementRef<'_>) -> Option<String> {
        None
    }

    fn expects_price(&self) -> bool {
        false
    }

    fn additional_pages(&self, doc: &Html) -> Vec<String> {
        doc.select(&self.next_page)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| !href.trim().is_empty())
            .filter_map(|href| crate::utils::resolve(self.site.base_url, href))
            .collect()
    }

    fn parse_title(&self, doc: &Html) -> Option<String> {
        first_text(doc, &self.title)
    }

    fn parse_description(&self, doc: &Html) -> Option<String> {
        first_text(doc, &self.description)
    }
}
