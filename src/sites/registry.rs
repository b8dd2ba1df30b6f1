// src/sites/registry.rs

//! URL-to-site resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{AppError, Result};
use crate::services::{
    AcquirePolicy, ErrorAggregator, FetchSettings, Fetcher, HttpTransport, RateLimiter,
};
use crate::sites::{Kleinanzeigen, SiteAdapter, WgGesucht, Zypresse};

/// An adapter together with the fetcher all its filters share.
pub struct SiteContext {
    pub adapter: Arc<dyn SiteAdapter>,
    pub fetcher: Fetcher,
}

impl SiteContext {
    pub fn key(&self) -> &'static str {
        self.adapter.descriptor().key
    }
}

/// Known sites, and the per-site fetchers created on first use.
pub struct SiteRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
    transport: Arc<dyn HttpTransport>,
    errors: Arc<ErrorAggregator>,
    settings: FetchSettings,
    policy: AcquirePolicy,
    contexts: Mutex<HashMap<&'static str, Arc<SiteContext>>>,
}

impl SiteRegistry {
    /// Empty registry; add sites with [`register`](Self::register).
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        errors: Arc<ErrorAggregator>,
        settings: FetchSettings,
        policy: AcquirePolicy,
    ) -> Self {
        Self {
            adapters: Vec::new(),
            transport,
            errors,
            settings,
            policy,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with every built-in site.
    pub fn with_default_sites(
        transport: Arc<dyn HttpTransport>,
        errors: Arc<ErrorAggregator>,
        settings: FetchSettings,
        policy: AcquirePolicy,
    ) -> Result<Self> {
        let mut registry = Self::new(transport, errors, settings, policy);
        for adapter in default_adapters()? {
            registry.register(adapter);
        }
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        log::debug!("Registered site {}", adapter.descriptor().key);
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[Arc<dyn SiteAdapter>] {
        &self.adapters
    }

    /// First adapter whose URL fragment occurs in `url`.
    pub fn identify(&self, url: &str) -> Option<&Arc<dyn SiteAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.descriptor().matches_url(url))
    }

    /// Site context for a filter URL. Every URL of the same site gets the
    /// same context, so they share one rate limiter and page cache.
    pub fn resolve(&self, url: &str) -> Result<Arc<SiteContext>> {
        let adapter = self
            .identify(url)
            .ok_or_else(|| AppError::UnknownSite(url.to_string()))?;
        let key = adapter.descriptor().key;

        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let context = contexts.entry(key).or_insert_with(|| {
            log::info!("Creating fetcher for {}", adapter.descriptor().name);
            Arc::new(SiteContext {
                adapter: Arc::clone(adapter),
                fetcher: Fetcher::new(
                    adapter.descriptor().clone(),
                    RateLimiter::new(key, self.policy),
                    Arc::clone(&self.transport),
                    Arc::clone(&self.errors),
                    self.settings.clone(),
                ),
            })
        });
        Ok(Arc::clone(context))
    }
}

/// Adapters for all supported sites.
pub fn default_adapters() -> Result<Vec<Arc<dyn SiteAdapter>>> {
    Ok(vec![
        Arc::new(Kleinanzeigen::new()?),
        Arc::new(WgGesucht::new()?),
        Arc::new(Zypresse::new()?),
    ])
}
