// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use rand::{Rng, rng};

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Fallback when the configured pool is empty.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

/// Create a configured asynchronous HTTP client.
///
/// The User-Agent is set per request, see [`random_user_agent`].
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()?;
    Ok(client)
}

/// Pick a User-Agent from the pool at random.
pub fn random_user_agent(pool: &[String]) -> &str {
    if pool.is_empty() {
        return DEFAULT_USER_AGENT;
    }
    let i = rng().random_range(0..pool.len());
    &pool[i]
}
