//! Persistence seams for filters and processed listings.
//!
//! The crawl engine only sees the two traits below. Implementations:
//!
//! - [`LocalStorage`]: JSON files under a root directory
//! - [`MemoryStorage`]: in-process maps, for embedding and tests
//!
//! ```text
//! storage/
//! ├── config.toml           # Crawler configuration
//! ├── filters.json          # Filter definitions
//! ├── processed.json        # Seen listings per filter
//! └── diagnostics/          # Bodies of pages that kept failing
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Filter, FilterId, ProcessedMap};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Source of the filters to crawl.
#[async_trait]
pub trait FilterStore: Send + Sync {
    /// Filters with `enabled == true`, in a stable order.
    async fn enabled_filters(&self) -> Result<Vec<Filter>>;

    /// Persist that a filter finished its first sweep.
    async fn mark_first_run_completed(&self, id: FilterId) -> Result<()>;
}

/// Durable home of the processed-listing map.
#[async_trait]
pub trait ProcessedStore: Send + Sync {
    /// Load everything. A missing store yields an empty map.
    async fn load(&self) -> Result<ProcessedMap>;

    /// Replace the stored map.
    async fn save(&self, entries: &ProcessedMap) -> Result<()>;
}
