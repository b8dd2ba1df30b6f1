// src/pipeline/scheduler.rs

//! The sweep loop.
//!
//! A sweep groups the enabled filters by site and runs one worker per
//! site concurrently. Inside a worker, filters run one after another so
//! they never compete for the site's request budget. Each filter runs in
//! its own task, so a panicking filter counts as failed and the worker
//! still records first runs and persists. When every worker is done the
//! scheduler sleeps and starts over.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::error::Result;
use crate::models::{Filter, FilterId};
use crate::pipeline::crawl::{CrawlContext, FilterRun, crawl_filter};
use crate::services::{ErrorAggregator, Notifier, ProcessedSet};
use crate::sites::{SiteContext, SiteRegistry};
use crate::storage::FilterStore;

/// Counters of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub sites: usize,
    pub completed: usize,
    pub aborted: usize,
    pub failed: usize,
    /// Filters whose URL matched no site
    pub skipped: usize,
    pub notified: usize,
}

impl AddAssign for SweepSummary {
    fn add_assign(&mut self, other: Self) {
        self.sites += other.sites;
        self.completed += other.completed;
        self.aborted += other.aborted;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.notified += other.notified;
    }
}

/// Top-level crawl loop.
pub struct CrawlScheduler {
    filters: Arc<dyn FilterStore>,
    registry: Arc<SiteRegistry>,
    processed: Arc<ProcessedSet>,
    errors: Arc<ErrorAggregator>,
    notifier: Arc<dyn Notifier>,
    sweep_interval: Duration,
}

impl CrawlScheduler {
    pub fn new(
        filters: Arc<dyn FilterStore>,
        registry: Arc<SiteRegistry>,
        processed: Arc<ProcessedSet>,
        errors: Arc<ErrorAggregator>,
        notifier: Arc<dyn Notifier>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            filters,
            registry,
            processed,
            errors,
            notifier,
            sweep_interval,
        }
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Sweep forever. Only returns if the runtime shuts down.
    pub async fn run(&self) {
        loop {
            match self.sweep().await {
                Ok(summary) => log::info!("Sweep finished: {:?}", summary),
                Err(e) => log::error!("Sweep failed: {}", e),
            }
            log::info!("Processed all filters. Waiting {:?}...", self.sweep_interval);
            tokio::time::sleep(self.sweep_interval).await;
        }
    }

    /// Run every enabled filter once.
    ///
    /// Fails only if the filter list cannot be read; failures of single
    /// filters are logged and counted.
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let filters = self.filters.enabled_filters().await?;
        log::info!("Found {} enabled filters", filters.len());

        let mut summary = SweepSummary::default();
        let mut groups: BTreeMap<&'static str, (Arc<SiteContext>, Vec<Filter>)> = BTreeMap::new();
        for filter in filters {
            match self.registry.resolve(&filter.url) {
                Ok(site) => groups
                    .entry(site.key())
                    .or_insert_with(|| (site, Vec::new()))
                    .1
                    .push(filter),
                Err(e) => {
                    log::error!("Skipping filter '{}' ({}): {}", filter.title, filter.id, e);
                    summary.skipped += 1;
                }
            }
        }

        let mut workers = JoinSet::new();
        for (_, (site, filters)) in groups {
            let worker = SiteWorker {
                site,
                filters,
                store: Arc::clone(&self.filters),
                processed: Arc::clone(&self.processed),
                errors: Arc::clone(&self.errors),
                notifier: Arc::clone(&self.notifier),
            };
            workers.spawn(worker.run());
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(site_summary) => summary += site_summary,
                Err(e) => log::error!("Site worker died: {}", e),
            }
        }

        Ok(summary)
    }
}

/// Runs the filters of one site in order.
struct SiteWorker {
    site: Arc<SiteContext>,
    filters: Vec<Filter>,
    store: Arc<dyn FilterStore>,
    processed: Arc<ProcessedSet>,
    errors: Arc<ErrorAggregator>,
    notifier: Arc<dyn Notifier>,
}

impl SiteWorker {
    async fn run(self) -> SweepSummary {
        let mut summary = SweepSummary {
            sites: 1,
            ..SweepSummary::default()
        };
        let mut first_runs: Vec<FilterId> = Vec::new();

        for filter in &self.filters {
            log::info!("Processing filter '{}' {}", filter.title, filter.id);
            let run = tokio::spawn(run_filter(
                Arc::clone(&self.site),
                Arc::clone(&self.processed),
                Arc::clone(&self.errors),
                Arc::clone(&self.notifier),
                filter.clone(),
            ));
            match run.await {
                Ok(Ok(FilterRun::Completed(outcome))) => {
                    summary.completed += 1;
                    summary.notified += outcome.notified;
                    if !filter.first_run_completed {
                        first_runs.push(filter.id);
                    }
                    log::info!("Finished filter '{}': {:?}", filter.title, outcome);
                }
                Ok(Ok(FilterRun::Aborted)) => summary.aborted += 1,
                Ok(Err(e)) => {
                    summary.failed += 1;
                    log::error!("Filter '{}' failed: {}", filter.title, e);
                }
                Err(e) => {
                    summary.failed += 1;
                    log::error!("Filter '{}' crashed: {}", filter.title, e);
                }
            }
            self.errors.maybe_alert();
        }

        for id in first_runs {
            if let Err(e) = self.store.mark_first_run_completed(id).await {
                log::error!("Could not record first run of {}: {}", id, e);
            }
        }
        if let Err(e) = self.processed.persist().await {
            log::error!("Could not persist processed listings: {}", e);
        }

        summary
    }
}

async fn run_filter(
    site: Arc<SiteContext>,
    processed: Arc<ProcessedSet>,
    errors: Arc<ErrorAggregator>,
    notifier: Arc<dyn Notifier>,
    filter: Filter,
) -> Result<FilterRun> {
    let ctx = CrawlContext {
        site: &site,
        processed: &processed,
        errors: &errors,
        notifier: notifier.as_ref(),
    };
    crawl_filter(&ctx, &filter).await
}
