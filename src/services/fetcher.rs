// src/services/fetcher.rs

//! Rate-limited, validating page fetcher.
//!
//! Every request goes through the site's [`RateLimiter`] and is checked
//! for throttling signals and site-specific garbage before the body is
//! handed to a parser. A failed attempt is retried exactly once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use scraper::Html;
use tokio::time::{Instant, sleep};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Config, CrawlerConfig, ErrorKind, SiteDescriptor};
use crate::services::{ErrorAggregator, RateLimiter};
use crate::utils::http::{create_async_client, random_user_agent};

/// Body some sites serve with a 200 when throttling.
const TOO_MANY_REQUESTS_MARKER: &str = "429 Too many requests";

/// Attempts per fetch, including the first.
const MAX_ATTEMPTS: usize = 2;

/// The parts of an HTTP response the fetcher looks at.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }
}

/// Performs a single GET.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, user_agent: &str) -> Result<RawResponse>;
}

/// [`HttpTransport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<RawResponse> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .map(|v| v.to_str().unwrap_or_default().to_string());
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: Arc<str>,
}

impl Page {
    /// Parse the body. The returned document is `!Send`; keep it out of
    /// any scope that crosses an `.await`.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Site-independent fetch settings.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agents: Vec<String>,

    /// Sleep after a throttling response without a usable Retry-After
    pub throttle_backoff: Duration,

    pub cache_ttl: Duration,

    /// Where bodies of persistently failing pages are dumped, if anywhere
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user_agents: config.crawler.user_agents.clone(),
            throttle_backoff: config.crawler.throttle_backoff(),
            cache_ttl: config.crawler.cache_ttl(),
            diagnostics_dir: Some(config.paths.diagnostics_dir.clone()),
        }
    }
}

struct AttemptFailure {
    reason: String,
    body: Option<String>,
}

impl AttemptFailure {
    fn new(reason: impl Into<String>, body: Option<String>) -> Self {
        Self {
            reason: reason.into(),
            body,
        }
    }
}

/// Fetches pages of one site.
pub struct Fetcher {
    site: SiteDescriptor,
    limiter: RateLimiter,
    transport: Arc<dyn HttpTransport>,
    errors: Arc<ErrorAggregator>,
    settings: FetchSettings,
    cache: Mutex<HashMap<String, (Instant, Page)>>,
}

impl Fetcher {
    pub fn new(
        site: SiteDescriptor,
        limiter: RateLimiter,
        transport: Arc<dyn HttpTransport>,
        errors: Arc<ErrorAggregator>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            site,
            limiter,
            transport,
            errors,
            settings,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn site(&self) -> &SiteDescriptor {
        &self.site
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Fetch and validate `url`, retrying once.
    ///
    /// Returns `None` when both attempts failed; every failed attempt is
    /// recorded as [`ErrorKind::HttpRequest`].
    pub async fn fetch(&self, url: &str) -> Option<Page> {
        log::info!("Loading URL: {}", url);

        let mut last_body = None;
        for attempt in 1..=MAX_ATTEMPTS {
            if let Err(e) = self.limiter.acquire(self.site.limits).await {
                log::error!("{}", e);
                self.errors.record(ErrorKind::HttpRequest);
                return None;
            }

            match self.attempt(url).await {
                Ok(body) => {
                    return Some(Page {
                        url: url.to_string(),
                        body: body.into(),
                    });
                }
                Err(failure) => {
                    self.errors.record(ErrorKind::HttpRequest);
                    log::warn!(
                        "[{}] Attempt {}/{} for {} failed: {}",
                        self.site.key,
                        attempt,
                        MAX_ATTEMPTS,
                        url,
                        failure.reason
                    );
                    if failure.body.is_some() {
                        last_body = failure.body;
                    }
                }
            }
        }

        log::error!("Giving up on {}", url);
        if let Some(body) = last_body {
            self.dump_diagnostics(url, &body).await;
        }
        None
    }

    /// Like [`fetch`](Self::fetch), but served from the page cache when a
    /// fresh copy exists. Successful fetches are cached.
    pub async fn fetch_cached(&self, url: &str) -> Option<Page> {
        if let Some(page) = self.cached(url) {
            log::info!("Loaded from cache: {}", url);
            return Some(page);
        }

        let page = self.fetch(url).await?;
        self.lock_cache()
            .insert(url.to_string(), (Instant::now(), page.clone()));
        Some(page)
    }

    /// Drop cache entries older than the configured TTL.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.settings.cache_ttl;
        let mut cache = self.lock_cache();
        let before = cache.len();
        cache.retain(|_, (added, _)| added.elapsed() < ttl);
        let evicted = before - cache.len();
        if evicted > 0 {
            log::debug!("[{}] Evicted {} cached pages", self.site.key, evicted);
        }
        evicted
    }

    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn cached(&self, url: &str) -> Option<Page> {
        let ttl = self.settings.cache_ttl;
        self.lock_cache()
            .get(url)
            .filter(|(added, _)| added.elapsed() < ttl)
            .map(|(_, page)| page.clone())
    }

    async fn attempt(&self, url: &str) -> std::result::Result<String, AttemptFailure> {
        let user_agent = random_user_agent(&self.settings.user_agents);
        let response = self
            .transport
            .get(url, user_agent)
            .await
            .map_err(|e| AttemptFailure::new(e.to_string(), None))?;

        match self.validate(url, &response).await {
            Ok(()) => Ok(response.body),
            Err(reason) => Err(AttemptFailure::new(reason, Some(response.body))),
        }
    }

    /// Check order: Retry-After, throttling, error status, invalid markup.
    async fn validate(&self, url: &str, response: &RawResponse) -> std::result::Result<(), String> {
        if let Some(value) = &response.retry_after {
            let wait = match value.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    log::error!(
                        "Retry-After without a usable value ({:?}), waiting {:?}",
                        value,
                        self.settings.throttle_backoff
                    );
                    self.settings.throttle_backoff
                }
            };
            log::warn!("Server sent Retry-After, waiting {:?}", wait);
            sleep(wait).await;
            return Err("Retry-After".into());
        }

        if response.status == 429 || response.body.contains(TOO_MANY_REQUESTS_MARKER) {
            log::warn!(
                "Too many requests without Retry-After, waiting {:?}",
                self.settings.throttle_backoff
            );
            sleep(self.settings.throttle_backoff).await;
            return Err("too many requests".into());
        }

        if response.status >= 400 {
            return Err(format!("status {}", response.status));
        }

        if self.site.is_invalid_html(&response.body) {
            log::error!("Invalid HTML detected for {}", url);
            return Err("invalid HTML".into());
        }

        Ok(())
    }

    async fn dump_diagnostics(&self, url: &str, body: &str) {
        let Some(dir) = &self.settings.diagnostics_dir else {
            return;
        };
        let path = dir.join(format!("{}-{}.html", self.site.key, Uuid::new_v4()));

        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;

        match written {
            Ok(()) => log::info!("Saved failing response of {} to {:?}", url, path),
            Err(e) => log::warn!("Could not save diagnostics to {:?}: {}", path, e),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, (Instant, Page)>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
