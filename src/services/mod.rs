//! Service layer for the crawler.
//!
//! This module contains the stateful building blocks of a sweep:
//! - Request admission per site (`RateLimiter`)
//! - Validated, retrying HTTP fetches (`Fetcher`)
//! - Error threshold alerts (`ErrorAggregator`)
//! - Seen-listing memory (`ProcessedSet`)
//! - Outbound notifications (`Notifier`)

mod error_aggregator;
mod fetcher;
mod notifier;
mod processed;
mod rate_limiter;

pub use error_aggregator::ErrorAggregator;
pub use fetcher::{FetchSettings, Fetcher, HttpTransport, Page, RawResponse, ReqwestTransport};
pub use notifier::{ChannelNotifier, LogNotifier, Notification, Notifier};
pub use processed::ProcessedSet;
pub use rate_limiter::{AcquirePolicy, RateLimiter};
