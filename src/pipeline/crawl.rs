// src/pipeline/crawl.rs

//! One filter, one sweep.

use scraper::Html;

use crate::error::Result;
use crate::models::{Filter, Listing};
use crate::pipeline::diff::split_new;
use crate::services::{ErrorAggregator, Notifier, Page, ProcessedSet};
use crate::sites::{SiteContext, template};

/// What a filter run needs. Borrowed from the site worker.
pub struct CrawlContext<'a> {
    pub site: &'a SiteContext,
    pub processed: &'a ProcessedSet,
    pub errors: &'a ErrorAggregator,
    pub notifier: &'a dyn Notifier,
}

/// Counters of a completed filter run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub pages: usize,
    pub listings: usize,
    pub new_listings: usize,
    pub matches: usize,
    pub notified: usize,
    /// New listings whose detail page could not be fetched; retried next sweep
    pub detail_failures: usize,
}

/// How a filter run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRun {
    Completed(CrawlOutcome),
    /// The first result page could not be fetched
    Aborted,
}

/// Crawl all result pages of `filter`, check new listings and notify on
/// matches.
///
/// Errors only if the first result page is structurally invalid; every
/// other failure is logged, classified and skipped.
pub async fn crawl_filter(ctx: &CrawlContext<'_>, filter: &Filter) -> Result<FilterRun> {
    let adapter = ctx.site.adapter.as_ref();
    let fetcher = &ctx.site.fetcher;

    let Some(first) = fetcher.fetch(&filter.url).await else {
        log::warn!("Could not load first page of '{}', skipping", filter.title);
        return Ok(FilterRun::Aborted);
    };

    let (first_listings, mut extra_urls) = {
        let doc = first.document();
        let listings = template::listings_from_page(adapter, &doc, ctx.errors)?;
        (listings, template::additional_pages(adapter, &doc))
    };
    extra_urls.retain(|url| *url != filter.url);
    log::info!("{} additional pages found", extra_urls.len());

    let mut pages = vec![first_listings];
    for (i, url) in extra_urls.iter().enumerate() {
        let Some(page) = fetcher.fetch(url).await else {
            continue;
        };
        match parse_results(ctx, &page) {
            Ok(listings) => {
                log::info!("Found {} links on page {}", listings.len(), i + 2);
                pages.push(listings);
            }
            Err(e) => log::warn!("Ignoring page {}: {}", i + 2, e),
        }
    }

    let mut outcome = CrawlOutcome {
        pages: pages.len(),
        ..CrawlOutcome::default()
    };

    // Oldest page first, oldest listing first
    let ordered: Vec<Listing> = pages
        .into_iter()
        .rev()
        .flat_map(|page| page.into_iter().rev())
        .collect();
    outcome.listings = ordered.len();

    let diff = split_new(ordered, &ctx.processed.known_links(filter.id));
    for listing in &diff.known {
        ctx.processed.touch(filter.id, &listing.link);
    }
    outcome.new_listings = diff.new.len();
    log::info!(
        "Analyzing {} new links, {} were already processed",
        diff.new.len(),
        diff.known.len()
    );

    for listing in &diff.new {
        let Some(page) = fetcher.fetch_cached(&listing.link).await else {
            outcome.detail_failures += 1;
            continue;
        };

        let matched = {
            let doc = page.document();
            template::is_match(adapter, &doc, filter, ctx.errors)
        };

        if matched {
            outcome.matches += 1;
            if filter.should_notify() {
                log::info!("Found match: {}", listing.link);
                ctx.notifier.notify_subscribers(filter, listing);
                outcome.notified += 1;
            } else {
                log::info!("Not notifying about match on first run: {}", listing.link);
            }
        } else {
            log::debug!("No match: {}", listing.link);
        }

        ctx.processed.touch(filter.id, &listing.link);
    }

    fetcher.evict_expired();
    Ok(FilterRun::Completed(outcome))
}

fn parse_results(ctx: &CrawlContext<'_>, page: &Page) -> Result<Vec<Listing>> {
    let doc: Html = page.document();
    template::listings_from_page(ctx.site.adapter.as_ref(), &doc, ctx.errors)
}
