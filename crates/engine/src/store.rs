//! Capped per-route price history with rolling statistics.
//!
//! Memory is authoritative for the running process. Every `record` flushes
//! the touched series to an [`ObservationStorage`]; a failed flush is reported
//! to the caller but never rolls back the in-memory append.

use async_trait::async_trait;
use flight_core::{Price, PriceObservation, RouteKey};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Observations kept per route key.
pub const HISTORY_WINDOW: usize = 30;
/// Observations required before an average is reported.
pub const MIN_BASELINE_SAMPLES: usize = 3;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage format error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Full history keyed by route, each series oldest-first.
pub type History = HashMap<RouteKey, Vec<PriceObservation>>;

/// Durable backing for the store.
#[async_trait]
pub trait ObservationStorage: Send + Sync {
    /// Read everything. A missing backing file or table is an empty history, not an error.
    async fn load(&self) -> Result<History, PersistenceError>;

    /// Replace the stored series for one key.
    async fn flush(
        &self,
        key: &RouteKey,
        observations: &[PriceObservation],
    ) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T: ObservationStorage + ?Sized> ObservationStorage for Arc<T> {
    async fn load(&self) -> Result<History, PersistenceError> {
        (**self).load().await
    }

    async fn flush(
        &self,
        key: &RouteKey,
        observations: &[PriceObservation],
    ) -> Result<(), PersistenceError> {
        (**self).flush(key, observations).await
    }
}

/// Store settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum observations per key; older ones are evicted.
    pub window: usize,
    /// Minimum observations for `average` to return a value.
    pub min_samples: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            window: HISTORY_WINDOW,
            min_samples: MIN_BASELINE_SAMPLES,
        }
    }
}

/// Summary of one route key's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceStats {
    pub count: usize,
    pub min: Price,
    pub max: Price,
    pub mean: Price,
    pub latest: Price,
}

/// Per-route price history.
pub struct PriceObservationStore {
    config: StoreConfig,
    history: HashMap<RouteKey, Vec<PriceObservation>>,
    storage: Box<dyn ObservationStorage>,
}

impl PriceObservationStore {
    /// Create an empty store without reading storage.
    pub fn new(config: StoreConfig, storage: Box<dyn ObservationStorage>) -> Self {
        Self {
            config,
            history: HashMap::new(),
            storage,
        }
    }

    /// Create a store hydrated from storage. Unreadable storage starts the store empty.
    pub async fn open(config: StoreConfig, storage: Box<dyn ObservationStorage>) -> Self {
        let mut store = Self::new(config, storage);
        if let Err(e) = store.load().await {
            warn!(error = %e, "Price history unreadable; starting empty");
        }
        store
    }

    /// Replace in-memory history with the contents of storage.
    /// Each loaded series is put in time order and trimmed to the window.
    /// Returns the number of keys loaded.
    pub async fn load(&mut self) -> Result<usize, PersistenceError> {
        let loaded = self.storage.load().await?;
        let window = self.config.window;

        self.history = loaded
            .into_iter()
            .filter(|(_, series)| !series.is_empty())
            .map(|(key, mut series)| {
                series.sort_by_key(|o| o.observed_at);
                if series.len() > window {
                    series.drain(..series.len() - window);
                }
                (key, series)
            })
            .collect();

        info!(routes = self.history.len(), "Loaded price history");
        Ok(self.history.len())
    }

    /// Append an observation, evict beyond the window, then flush the key.
    ///
    /// The in-memory append always takes effect; an `Err` only means the flush failed.
    pub async fn record(
        &mut self,
        key: RouteKey,
        observation: PriceObservation,
    ) -> Result<(), PersistenceError> {
        let window = self.config.window.max(1);
        let series = self.history.entry(key.clone()).or_default();
        series.push(observation);
        if series.len() > window {
            let excess = series.len() - window;
            series.drain(..excess);
        }

        self.storage.flush(&key, series).await
    }

    /// Arithmetic mean of the stored prices, or `None` below the minimum sample size.
    pub fn average(&self, key: &RouteKey) -> Option<Price> {
        let series = self.history.get(key)?;
        if series.len() < self.config.min_samples.max(1) {
            return None;
        }
        Price::mean(series.iter().map(|o| &o.price))
    }

    /// Count, min, max, mean and latest price for a key with any history.
    pub fn stats(&self, key: &RouteKey) -> Option<PriceStats> {
        let series = self.history.get(key)?;
        let latest = series.last()?.price;
        let prices = series.iter().map(|o| o.price);
        Some(PriceStats {
            count: series.len(),
            min: prices.clone().min()?,
            max: prices.max()?,
            mean: Price::mean(series.iter().map(|o| &o.price))?,
            latest,
        })
    }

    /// Stored observations for a key, oldest first.
    pub fn observations(&self, key: &RouteKey) -> &[PriceObservation] {
        self.history.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of tracked route keys.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl std::fmt::Debug for PriceObservationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceObservationStore")
            .field("config", &self.config)
            .field("routes", &self.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn key() -> RouteKey {
        RouteKey::new("EZE", "JFK", NaiveDate::from_ymd_opt(2026, 11, 18).unwrap())
    }

    fn obs(units: u64, minute: i64) -> PriceObservation {
        let base = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        PriceObservation::new(Price::from_units(units), "USD", base + Duration::minutes(minute))
    }

    fn store() -> (PriceObservationStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = PriceObservationStore::new(StoreConfig::default(), Box::new(storage.clone()));
        (store, storage)
    }

    #[tokio::test]
    async fn test_average_needs_three_samples() {
        let (mut store, _) = store();
        store.record(key(), obs(100, 0)).await.unwrap();
        store.record(key(), obs(900, 1)).await.unwrap();
        assert_eq!(store.average(&key()), None);

        store.record(key(), obs(200, 2)).await.unwrap();
        assert_eq!(store.average(&key()), Some(Price::from_units(400)));
    }

    #[tokio::test]
    async fn test_window_evicts_oldest() {
        let (mut store, storage) = store();
        for i in 0..45u64 {
            store.record(key(), obs(100 + i, i as i64)).await.unwrap();
            assert!(store.observations(&key()).len() <= HISTORY_WINDOW);
        }

        let series = store.observations(&key());
        assert_eq!(series.len(), HISTORY_WINDOW);
        assert_eq!(series.first().unwrap().price, Price::from_units(115));
        assert_eq!(series.last().unwrap().price, Price::from_units(144));
        assert!(series.windows(2).all(|w| w[0].observed_at <= w[1].observed_at));

        // storage always mirrors the pruned series
        assert_eq!(storage.series(&key()), series.to_vec());
    }

    #[tokio::test]
    async fn test_average_is_mean_of_window_only() {
        let (mut store, _) = store();
        for i in 0..30 {
            store.record(key(), obs(1000, i)).await.unwrap();
        }
        for i in 30..60 {
            store.record(key(), obs(100, i)).await.unwrap();
        }
        assert_eq!(store.average(&key()), Some(Price::from_units(100)));
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_memory() {
        let (mut store, storage) = store();
        storage.set_failing(true);
        let result = store.record(key(), obs(500, 0)).await;
        assert!(matches!(result, Err(PersistenceError::Unavailable(_))));
        assert_eq!(store.observations(&key()).len(), 1);
        assert!(storage.series(&key()).is_empty());
    }

    #[tokio::test]
    async fn test_open_hydrates_and_trims() {
        let storage = Arc::new(MemoryStorage::new());
        // stored out of order and longer than the window
        let mut series: Vec<_> = (0..40).rev().map(|i| obs(100 + i as u64, i)).collect();
        series.push(obs(1, -5));
        storage.flush(&key(), &series).await.unwrap();

        let store = PriceObservationStore::open(StoreConfig::default(), Box::new(storage)).await;
        let loaded = store.observations(&key());
        assert_eq!(loaded.len(), HISTORY_WINDOW);
        assert_eq!(loaded.first().unwrap().price, Price::from_units(110));
        assert_eq!(loaded.last().unwrap().price, Price::from_units(139));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_open_with_unreadable_storage_starts_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_failing(true);
        let store = PriceObservationStore::open(StoreConfig::default(), Box::new(storage)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let (mut store, _) = store();
        assert_eq!(store.stats(&key()), None);
        for (i, units) in [300u64, 100, 500].into_iter().enumerate() {
            store.record(key(), obs(units, i as i64)).await.unwrap();
        }
        assert_eq!(
            store.stats(&key()),
            Some(PriceStats {
                count: 3,
                min: Price::from_units(100),
                max: Price::from_units(500),
                mean: Price::from_units(300),
                latest: Price::from_units(500),
            })
        );
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (mut store, _) = store();
        let other = RouteKey::new("AEP", "JFK", NaiveDate::from_ymd_opt(2026, 11, 18).unwrap());
        for i in 0..3 {
            store.record(key(), obs(100, i)).await.unwrap();
        }
        store.record(other.clone(), obs(999, 0)).await.unwrap();
        assert_eq!(store.average(&key()), Some(Price::from_units(100)));
        assert_eq!(store.average(&other), None);
        assert_eq!(store.len(), 2);
    }
}
