//! Crawl pipeline.
//!
//! - `diff`: split a scrape into new and known listings
//! - `crawl`: one filter through one sweep
//! - `scheduler`: the per-site concurrent sweep loop

pub mod crawl;
pub mod diff;
pub mod scheduler;

use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::services::{
    AcquirePolicy, ErrorAggregator, FetchSettings, HttpTransport, Notifier, ProcessedSet,
};
use crate::sites::SiteRegistry;
use crate::storage::{FilterStore, ProcessedStore};

pub use crawl::{CrawlContext, CrawlOutcome, FilterRun, crawl_filter};
pub use diff::{ListingDiff, split_new};
pub use scheduler::{CrawlScheduler, SweepSummary};

/// Wire a scheduler over one storage backend, restoring processed state.
pub async fn build_scheduler<S>(
    config: &Config,
    storage: Arc<S>,
    transport: Arc<dyn HttpTransport>,
    notifier: Arc<dyn Notifier>,
) -> Result<CrawlScheduler>
where
    S: FilterStore + ProcessedStore + 'static,
{
    let errors = Arc::new(ErrorAggregator::new(Arc::clone(&notifier), &config.alerts));
    let registry = SiteRegistry::with_default_sites(
        transport,
        Arc::clone(&errors),
        FetchSettings::from_config(config),
        AcquirePolicy::from(&config.limiter),
    )?;

    let filters: Arc<dyn FilterStore> = storage.clone();
    let processed_store: Arc<dyn ProcessedStore> = storage;
    let processed = ProcessedSet::restore(processed_store, config.retention.window()).await;

    Ok(CrawlScheduler::new(
        filters,
        Arc::new(registry),
        Arc::new(processed),
        errors,
        notifier,
        config.scheduler.sweep_interval(),
    ))
}
