// src/services/processed.rs

//! Per-filter memory of listings already seen.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{FilterId, ProcessedEntry, ProcessedMap};
use crate::storage::ProcessedStore;

/// Seen listings, keyed by filter id.
///
/// Buckets are never shared between filters, even when two filters point
/// at the same search URL.
pub struct ProcessedSet {
    entries: Mutex<ProcessedMap>,
    store: Arc<dyn ProcessedStore>,
    retention: chrono::Duration,
    save_lock: tokio::sync::Mutex<()>,
}

impl ProcessedSet {
    /// Start with an empty map.
    pub fn new(store: Arc<dyn ProcessedStore>, retention: chrono::Duration) -> Self {
        Self::with_entries(store, retention, ProcessedMap::new())
    }

    fn with_entries(
        store: Arc<dyn ProcessedStore>,
        retention: chrono::Duration,
        entries: ProcessedMap,
    ) -> Self {
        Self {
            entries: Mutex::new(entries),
            store,
            retention,
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load from `store`, starting clean if that fails. The loaded state
    /// is written back right away so the store reflects pruning.
    pub async fn restore(store: Arc<dyn ProcessedStore>, retention: chrono::Duration) -> Self {
        let entries = match store.load().await {
            Ok(entries) => {
                log::info!("Restored processed listings for {} filters", entries.len());
                entries
            }
            Err(e) => {
                log::error!("Could not restore processed listings: {}. Starting clean.", e);
                ProcessedMap::new()
            }
        };

        let set = Self::with_entries(store, retention, entries);
        if let Err(e) = set.persist().await {
            log::warn!("Could not write back processed listings: {}", e);
        }
        set
    }

    /// Snapshot of a filter's entries. Creates the bucket on first access.
    pub fn entries(&self, filter: FilterId) -> Vec<ProcessedEntry> {
        self.lock().entry(filter).or_default().clone()
    }

    /// Links already seen for a filter.
    pub fn known_links(&self, filter: FilterId) -> HashSet<String> {
        self.lock()
            .get(&filter)
            .map(|entries| entries.iter().map(|e| e.uri.clone()).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, filter: FilterId, link: &str) -> bool {
        self.lock()
            .get(&filter)
            .is_some_and(|entries| entries.iter().any(|e| e.uri == link))
    }

    /// Record `link` as seen now, or refresh its `last_found`.
    pub fn touch(&self, filter: FilterId, link: &str) {
        self.touch_at(filter, link, Utc::now());
    }

    pub fn touch_at(&self, filter: FilterId, link: &str, now: DateTime<Utc>) {
        let mut map = self.lock();
        let bucket = map.entry(filter).or_default();
        match bucket.iter_mut().find(|e| e.uri == link) {
            Some(entry) => entry.last_found = now,
            None => bucket.push(ProcessedEntry::new(link, now)),
        }
    }

    /// Remove entries not seen within the retention window, and buckets
    /// left empty. Returns the number of entries removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut map = self.lock();
        let mut removed = 0;
        map.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|e| e.last_found >= cutoff);
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        removed
    }

    /// Number of filters with at least one entry.
    pub fn filter_count(&self) -> usize {
        self.lock().len()
    }

    /// Prune, then write the whole map through to the store.
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let removed = self.prune(Utc::now());
        if removed > 0 {
            log::info!("Pruned {} processed listings past retention", removed);
        }
        let snapshot = self.lock().clone();
        self.store.save(&snapshot).await
    }

    fn lock(&self) -> MutexGuard<'_, ProcessedMap> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
