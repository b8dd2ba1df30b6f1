//! In-memory storage backend.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Filter, FilterId, ProcessedMap};
use crate::storage::{FilterStore, ProcessedStore};

/// Keeps filters and processed listings in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    filters: Mutex<Vec<Filter>>,
    processed: Mutex<ProcessedMap>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(filters: Vec<Filter>) -> Self {
        Self {
            filters: Mutex::new(filters),
            ..Self::default()
        }
    }

    pub fn add_filter(&self, filter: Filter) {
        lock(&self.filters).push(filter);
    }

    /// Snapshot of all filters.
    pub fn filters(&self) -> Vec<Filter> {
        lock(&self.filters).clone()
    }

    pub fn filter(&self, id: FilterId) -> Option<Filter> {
        lock(&self.filters).iter().find(|f| f.id == id).cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl FilterStore for MemoryStorage {
    async fn enabled_filters(&self) -> Result<Vec<Filter>> {
        Ok(lock(&self.filters)
            .iter()
            .filter(|f| f.enabled)
            .cloned()
            .collect())
    }

    async fn mark_first_run_completed(&self, id: FilterId) -> Result<()> {
        if let Some(filter) = lock(&self.filters).iter_mut().find(|f| f.id == id) {
            filter.mark_first_run_completed();
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessedStore for MemoryStorage {
    async fn load(&self) -> Result<ProcessedMap> {
        Ok(lock(&self.processed).clone())
    }

    async fn save(&self, entries: &ProcessedMap) -> Result<()> {
        *lock(&self.processed) = entries.clone();
        Ok(())
    }
}
