// src/sites/template.rs

//! Parsing steps shared by every site.
//!
//! The functions here drive a [`SiteAdapter`] through a page and turn its
//! `None`s into classified errors. None of them fail on a single bad
//! entry: a broken listing or detail page is recorded and skipped.

use scraper::Html;

use crate::error::{AppError, Result};
use crate::models::{ErrorKind, Filter, Listing};
use crate::services::ErrorAggregator;
use crate::sites::{SiteAdapter, keywords};

/// Extract the listings of a search result page.
///
/// Fails only if the page does not pass the adapter's structure check. A
/// result entry without a link stops parsing of the page: the entries
/// before it are returned and a [`ErrorKind::ParseLink`] is recorded.
pub fn listings_from_page(
    adapter: &dyn SiteAdapter,
    doc: &Html,
    errors: &ErrorAggregator,
) -> Result<Vec<Listing>> {
    let site = adapter.descriptor();
    adapter
        .validate_page(doc)
        .map_err(|reason| AppError::invalid_page(site.key, reason))?;

    let mut listings = Vec::new();
    for node in adapter.result_nodes(doc) {
        if adapter.should_skip(node) {
            log::trace!("[{}] Skipping promoted result", site.key);
            continue;
        }

        let Some(link) = adapter.parse_link(node) else {
            log::error!(
                "[{}] Could not parse result link, ignoring the rest of the page",
                site.key
            );
            errors.record(ErrorKind::ParseLink);
            break;
        };

        let creation_date = field_or_empty(
            adapter.parse_date(node),
            adapter.expects_date(),
            ErrorKind::ParseDate,
            &link,
            errors,
        );
        let price = field_or_empty(
            adapter.parse_price(node),
            adapter.expects_price(),
            ErrorKind::ParsePrice,
            &link,
            errors,
        );

        listings.push(Listing {
            link,
            creation_date,
            price,
        });
    }

    Ok(listings)
}

fn field_or_empty(
    value: Option<String>,
    expected: bool,
    kind: ErrorKind,
    link: &str,
    errors: &ErrorAggregator,
) -> String {
    match value {
        Some(value) => value,
        None => {
            if expected {
                log::warn!("Missing {} for {}", kind, link);
                errors.record(kind);
            }
            String::new()
        }
    }
}

/// Further result pages, deduplicated, in page order.
pub fn additional_pages(adapter: &dyn SiteAdapter, doc: &Html) -> Vec<String> {
    let mut pages = adapter.additional_pages(doc);
    let mut seen = std::collections::HashSet::new();
    pages.retain(|url| seen.insert(url.clone()));
    pages
}

/// Whether a detail page matches a filter's keywords.
///
/// Taken-down listings are a plain `false`. A page without title or
/// description records [`ErrorKind::ParseTitle`] or
/// [`ErrorKind::ParseDescription`] and is also treated as no match.
pub fn is_match(
    adapter: &dyn SiteAdapter,
    doc: &Html,
    filter: &Filter,
    errors: &ErrorAggregator,
) -> bool {
    let site = adapter.descriptor().key;
    if adapter.listing_gone(doc) {
        log::warn!("[{}] Listing does not exist anymore", site);
        return false;
    }

    let Some(title) = adapter.parse_title(doc) else {
        log::error!("[{}] Could not parse title", site);
        errors.record(ErrorKind::ParseTitle);
        return false;
    };
    let Some(description) = adapter.parse_description(doc) else {
        log::error!("[{}] Could not parse description of '{}'", site, title);
        errors.record(ErrorKind::ParseDescription);
        return false;
    };

    keywords::matches(filter, &format!("{}\n{}", title, description))
}
