//! Local filesystem storage implementation.
//!
//! Filters and processed listings live as pretty-printed JSON files under
//! one root directory. Every write goes to a temp file first and is then
//! renamed over the target, so a crash never leaves a torn file behind.
//!
//! ## Legacy format
//!
//! Older installations stored processed listings as bare URL lists
//! (`{ "<filter id>": ["https://..."] }`). Such a file is backed up once to
//! `processed.json.bak` and converted, stamping every URL with the load time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Filter, FilterId, ProcessedEntry, ProcessedMap};
use crate::storage::{FilterStore, ProcessedStore};

const FILTERS_KEY: &str = "filters.json";
const PROCESSED_KEY: &str = "processed.json";
const PROCESSED_BACKUP_KEY: &str = "processed.json.bak";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    /// Serializes read-modify-write cycles on the filter file
    filters_lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            filters_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All filters, enabled or not. Missing file means none.
    pub async fn load_filters(&self) -> Result<Vec<Filter>> {
        Ok(self.read_json(FILTERS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_filters(&self, filters: &[Filter]) -> Result<()> {
        let _guard = self.filters_lock.lock().await;
        self.write_json(FILTERS_KEY, filters).await
    }

    /// Convert a legacy processed file, keeping a one-time backup.
    async fn migrate_processed(&self, bytes: &[u8]) -> Result<ProcessedMap> {
        let legacy: HashMap<FilterId, Vec<String>> = serde_json::from_slice(bytes)?;
        log::warn!(
            "{} has the legacy format, converting {} filters",
            PROCESSED_KEY,
            legacy.len()
        );

        if self.read_bytes(PROCESSED_BACKUP_KEY).await?.is_none() {
            self.write_bytes(PROCESSED_BACKUP_KEY, bytes).await?;
        }

        let now = Utc::now();
        let converted: ProcessedMap = legacy
            .into_iter()
            .map(|(id, uris)| {
                let entries = uris
                    .into_iter()
                    .map(|uri| ProcessedEntry::new(uri, now))
                    .collect();
                (id, entries)
            })
            .collect();

        self.write_json(PROCESSED_KEY, &converted).await?;
        Ok(converted)
    }
}

#[async_trait]
impl FilterStore for LocalStorage {
    async fn enabled_filters(&self) -> Result<Vec<Filter>> {
        let filters = self.load_filters().await?;
        Ok(filters.into_iter().filter(|f| f.enabled).collect())
    }

    async fn mark_first_run_completed(&self, id: FilterId) -> Result<()> {
        let _guard = self.filters_lock.lock().await;
        let mut filters = self.load_filters().await?;

        let Some(filter) = filters.iter_mut().find(|f| f.id == id) else {
            log::warn!("Filter {} vanished before its first run was recorded", id);
            return Ok(());
        };
        if filter.first_run_completed {
            return Ok(());
        }
        filter.mark_first_run_completed();

        self.write_json(FILTERS_KEY, &filters).await
    }
}

#[async_trait]
impl ProcessedStore for LocalStorage {
    async fn load(&self) -> Result<ProcessedMap> {
        let Some(bytes) = self.read_bytes(PROCESSED_KEY).await? else {
            log::warn!("{} not found, starting clean", PROCESSED_KEY);
            return Ok(ProcessedMap::new());
        };

        match serde_json::from_slice(&bytes) {
            Ok(map) => Ok(map),
            Err(e) => self.migrate_processed(&bytes).await.map_err(|_| AppError::Json(e)),
        }
    }

    async fn save(&self, entries: &ProcessedMap) -> Result<()> {
        self.write_json(PROCESSED_KEY, entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load().await.unwrap().is_empty());
        assert!(storage.enabled_filters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enabled_filters_and_first_run() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let active = Filter::new("Bikes", "https://www.kleinanzeigen.de/s-fahrrad/k0");
        let mut paused = Filter::new("Sofas", "https://www.kleinanzeigen.de/s-sofa/k0");
        paused.enabled = false;
        storage
            .save_filters(&[active.clone(), paused])
            .await
            .unwrap();

        let enabled = storage.enabled_filters().await.unwrap();
        assert_eq!(enabled, vec![active.clone()]);

        storage.mark_first_run_completed(active.id).await.unwrap();
        let reloaded = storage.enabled_filters().await.unwrap();
        assert!(reloaded[0].first_run_completed);

        // Unknown ids are ignored
        storage.mark_first_run_completed(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_processed_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let id = Uuid::new_v4();

        let mut map = ProcessedMap::new();
        map.insert(id, vec![ProcessedEntry::new("https://a/1", Utc::now())]);
        storage.save(&map).await.unwrap();

        assert_eq!(storage.load().await.unwrap(), map);
    }

    #[tokio::test]
    async fn test_legacy_processed_file_is_converted() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let id = Uuid::new_v4();
        let legacy = format!(r#"{{"{}": ["https://a/1", "https://a/2"]}}"#, id);
        std::fs::write(tmp.path().join(PROCESSED_KEY), &legacy).unwrap();

        let map = storage.load().await.unwrap();

        assert_eq!(map[&id].len(), 2);
        assert_eq!(map[&id][0].uri, "https://a/1");
        let backup = std::fs::read_to_string(tmp.path().join(PROCESSED_BACKUP_KEY)).unwrap();
        assert_eq!(backup, legacy);
        // Converted file now loads without migration
        assert_eq!(storage.load().await.unwrap(), map);
    }

    #[tokio::test]
    async fn test_corrupt_processed_file_errors() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        std::fs::write(tmp.path().join(PROCESSED_KEY), "{not json").unwrap();

        assert!(matches!(storage.load().await, Err(AppError::Json(_))));
    }
}
