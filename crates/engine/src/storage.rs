//! File and in-memory observation storage.

use crate::store::{History, ObservationStorage, PersistenceError};
use async_trait::async_trait;
use flight_core::{PriceObservation, RouteKey};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// On-disk layout: route key string -> observations, oldest first.
type FileContents = BTreeMap<String, Vec<PriceObservation>>;

/// Stores the whole history as one pretty-printed JSON document.
///
/// Every flush rewrites the file through a temporary sibling and a rename,
/// so a crash mid-write leaves the previous version intact.
pub struct JsonFileStorage {
    path: PathBuf,
    contents: tokio::sync::Mutex<FileContents>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: tokio::sync::Mutex::new(FileContents::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ObservationStorage for JsonFileStorage {
    async fn load(&self) -> Result<History, PersistenceError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No price history file yet");
                return Ok(History::new());
            }
            Err(e) => return Err(e.into()),
        };

        let parsed: FileContents = serde_json::from_slice(&raw)?;
        let mut history = History::new();
        for (raw_key, series) in &parsed {
            match raw_key.parse::<RouteKey>() {
                Ok(key) => {
                    history.insert(key, series.clone());
                }
                Err(e) => warn!(key = %raw_key, error = %e, "Skipping unreadable history key"),
            }
        }

        *self.contents.lock().await = parsed;
        Ok(history)
    }

    async fn flush(
        &self,
        key: &RouteKey,
        observations: &[PriceObservation],
    ) -> Result<(), PersistenceError> {
        let mut contents = self.contents.lock().await;
        contents.insert(key.to_string(), observations.to_vec());
        let json = serde_json::to_vec_pretty(&*contents)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Keeps history in memory only. Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<History>,
    failing: AtomicBool,
    flushes: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent loads and flushes fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Stored series for a key.
    pub fn series(&self, key: &RouteKey) -> Vec<PriceObservation> {
        self.data
            .lock()
            .ok()
            .and_then(|d| d.get(key).cloned())
            .unwrap_or_default()
    }

    /// Number of successful flushes.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(PersistenceError::Unavailable(
                "memory storage set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ObservationStorage for MemoryStorage {
    async fn load(&self) -> Result<History, PersistenceError> {
        self.check()?;
        self.data
            .lock()
            .map(|d| d.clone())
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))
    }

    async fn flush(
        &self,
        key: &RouteKey,
        observations: &[PriceObservation],
    ) -> Result<(), PersistenceError> {
        self.check()?;
        let mut data = self
            .data
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        data.insert(key.clone(), observations.to_vec());
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
