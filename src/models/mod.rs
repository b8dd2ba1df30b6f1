// src/models/mod.rs

//! Domain models for the crawler.
//!
//! This module contains the data structures shared by the services,
//! site adapters and the crawl pipeline.

mod config;
mod error_kind;
mod filter;
mod listing;
mod site;

// Re-export all public types
pub use config::{
    AlertConfig, Config, CrawlerConfig, LimiterConfig, NotifyConfig, PathsConfig,
    RetentionConfig, SchedulerConfig,
};
pub use error_kind::{ErrorKind, ErrorRecord};
pub use filter::{Filter, FilterId};
pub use listing::{Listing, ProcessedEntry, ProcessedMap};
pub use site::{SiteDescriptor, SiteLimits};
