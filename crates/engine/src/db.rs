//! SQLite storage for price history.

use crate::store::{History, ObservationStorage, PersistenceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flight_core::{Price, PriceObservation, RouteKey};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// SQLite-backed observation storage.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Connect to the SQLite database at the given URL and create the schema.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // every in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Like [`connect`](Self::connect), but a database file that cannot be opened
    /// is moved aside to `<file>.corrupt` and a fresh one is created in its place.
    pub async fn connect_or_recover(database_url: &str) -> Result<Self, PersistenceError> {
        let err = match Self::connect(database_url).await {
            Ok(db) => return Ok(db),
            Err(e) => e,
        };
        let Some(path) = database_path(database_url).filter(|p| p.exists()) else {
            return Err(err);
        };

        let moved = with_suffix(&path, ".corrupt");
        warn!(
            path = %path.display(),
            moved_to = %moved.display(),
            error = %err,
            "Price database unreadable; starting a fresh one"
        );
        tokio::fs::rename(&path, &moved).await?;
        // journal files of the old database would be replayed into the new one
        for suffix in ["-wal", "-shm"] {
            let _ = tokio::fs::remove_file(with_suffix(&path, suffix)).await;
        }

        Self::connect(database_url).await
    }

    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_observations (
                route_key TEXT NOT NULL,
                seq INTEGER NOT NULL,
                price INTEGER NOT NULL,
                currency TEXT NOT NULL,
                observed_at TEXT NOT NULL,
                PRIMARY KEY (route_key, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of stored rows across all keys.
    pub async fn row_count(&self) -> Result<i64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM price_observations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// File behind a `sqlite:` URL. `None` for in-memory databases.
fn database_path(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn decode_row(
    price: i64,
    currency: String,
    observed_at: &str,
) -> Result<PriceObservation, PersistenceError> {
    let price = u64::try_from(price)
        .map_err(|_| PersistenceError::Corrupt(format!("negative price {price}")))?;
    let observed_at = DateTime::parse_from_rfc3339(observed_at)
        .map_err(|e| PersistenceError::Corrupt(format!("bad timestamp {observed_at}: {e}")))?
        .with_timezone(&Utc);
    Ok(PriceObservation::new(Price(price), currency, observed_at))
}

#[async_trait]
impl ObservationStorage for SqliteStorage {
    async fn load(&self) -> Result<History, PersistenceError> {
        let rows = sqlx::query_as::<_, (String, i64, String, String)>(
            "SELECT route_key, price, currency, observed_at FROM price_observations ORDER BY route_key, seq",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut history = History::new();
        for (raw_key, price, currency, observed_at) in rows {
            let key = match raw_key.parse::<RouteKey>() {
                Ok(key) => key,
                Err(e) => {
                    warn!(key = %raw_key, error = %e, "Skipping unreadable history key");
                    continue;
                }
            };
            match decode_row(price, currency, &observed_at) {
                Ok(obs) => history.entry(key).or_default().push(obs),
                Err(e) => warn!(key = %raw_key, error = %e, "Skipping unreadable observation"),
            }
        }

        Ok(history)
    }

    async fn flush(
        &self,
        key: &RouteKey,
        observations: &[PriceObservation],
    ) -> Result<(), PersistenceError> {
        let route_key = key.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM price_observations WHERE route_key = ?")
            .bind(&route_key)
            .execute(&mut *tx)
            .await?;

        for (seq, obs) in observations.iter().enumerate() {
            let price = i64::try_from(obs.price.0)
                .map_err(|_| PersistenceError::Corrupt(format!("price {} out of range", obs.price)))?;
            sqlx::query(
                r#"
                INSERT INTO price_observations (route_key, seq, price, currency, observed_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&route_key)
            .bind(seq as i64)
            .bind(price)
            .bind(&obs.currency)
            .bind(obs.observed_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn key(dest: &str) -> RouteKey {
        RouteKey::new("EZE", dest, NaiveDate::from_ymd_opt(2026, 11, 18).unwrap())
    }

    fn obs(cents: u64, minute: i64) -> PriceObservation {
        let base = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        PriceObservation::new(Price::from_cents(cents), "USD", base + Duration::minutes(minute))
    }

    fn temp_db(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flight-engine-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("prices.db")
    }

    #[test]
    fn test_database_path() {
        assert_eq!(database_path("sqlite://prices.db"), Some(PathBuf::from("prices.db")));
        assert_eq!(
            database_path("sqlite:///var/lib/bot/prices.db?mode=rwc"),
            Some(PathBuf::from("/var/lib/bot/prices.db"))
        );
        assert_eq!(database_path("sqlite:prices.db"), Some(PathBuf::from("prices.db")));
        assert_eq!(database_path("sqlite::memory:"), None);
        assert_eq!(database_path("prices.json"), None);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_replaced_with_empty_database() {
        let path = temp_db("garbage");
        std::fs::write(&path, vec![0x42u8; 8192]).unwrap();
        let url = format!("sqlite://{}", path.display());
        assert!(SqliteStorage::connect(&url).await.is_err());

        let db = SqliteStorage::connect_or_recover(&url).await.unwrap();
        assert!(db.load().await.unwrap().is_empty());
        db.flush(&key("JFK"), &[obs(50000, 0)]).await.unwrap();
        assert_eq!(db.load().await.unwrap()[&key("JFK")], vec![obs(50000, 0)]);

        let moved = std::fs::read(path.with_file_name("prices.db.corrupt")).unwrap();
        assert_eq!(moved.len(), 8192);
    }

    #[tokio::test]
    async fn test_recover_keeps_readable_database() {
        let path = temp_db("healthy");
        let _ = std::fs::remove_file(&path);
        let url = format!("sqlite://{}", path.display());
        let db = SqliteStorage::connect(&url).await.unwrap();
        db.flush(&key("MIA"), &[obs(41000, 0)]).await.unwrap();
        db.pool.close().await;

        let db = SqliteStorage::connect_or_recover(&url).await.unwrap();
        assert_eq!(db.load().await.unwrap()[&key("MIA")], vec![obs(41000, 0)]);
        assert!(!path.with_file_name("prices.db.corrupt").exists());
    }

    #[tokio::test]
    async fn test_empty_database_loads_empty() {
        let db = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        assert!(db.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_replaces_series() {
        let db = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        db.flush(&key("JFK"), &[obs(50000, 0), obs(51050, 1)]).await.unwrap();
        db.flush(&key("MIA"), &[obs(41000, 0)]).await.unwrap();
        assert_eq!(db.row_count().await.unwrap(), 3);

        db.flush(&key("JFK"), &[obs(51050, 1), obs(49999, 2)]).await.unwrap();
        let history = db.load().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[&key("JFK")], vec![obs(51050, 1), obs(49999, 2)]);
        assert_eq!(history[&key("MIA")], vec![obs(41000, 0)]);
        assert_eq!(db.row_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_skipped() {
        let db = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        db.flush(&key("JFK"), &[obs(50000, 0)]).await.unwrap();
        sqlx::query(
            "INSERT INTO price_observations (route_key, seq, price, currency, observed_at) VALUES ('EZE-JFK-2026-11-18', 1, -5, 'USD', 'yesterday')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let history = db.load().await.unwrap();
        assert_eq!(history[&key("JFK")], vec![obs(50000, 0)]);
    }
}
