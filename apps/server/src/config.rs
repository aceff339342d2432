//! Application configuration.

use flight_alerts::DispatchError;
use flight_core::{default_routes, RoutePolicy};
use flight_engine::{ClassifierConfig, PersistenceError, SchedulerConfig};
use flight_search::SearchError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("Cannot read route file: {0}")]
    RoutesIo(#[from] std::io::Error),
    #[error("Cannot parse route file: {0}")]
    RoutesFormat(#[from] serde_json::Error),
    #[error("Invalid route: {0}")]
    InvalidRoute(String),
    #[error("Flight search client setup failed: {0}")]
    Search(#[from] SearchError),
    #[error("Telegram setup failed: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Storage setup failed: {0}")]
    Storage(#[from] PersistenceError),
}

/// Secrets read from the environment. All four are required.
#[derive(Clone)]
pub struct Credentials {
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub amadeus_api_key: String,
    pub amadeus_api_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`; empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        Ok(Self {
            telegram_bot_token: require("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: require("TELEGRAM_CHAT_ID")?,
            amadeus_api_key: require("AMADEUS_API_KEY")?,
            amadeus_api_secret: require("AMADEUS_API_SECRET")?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish_non_exhaustive()
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduler configuration.
    pub scheduler: SchedulerSettings,
    /// Price history location: a `.json` path, a `sqlite:` URL or `memory`.
    pub storage: String,
    /// Route catalog override; the built-in catalog when absent.
    pub routes_file: Option<String>,
    /// Liveness endpoint.
    pub health: HealthSettings,
    /// Amadeus API host.
    pub amadeus_url: String,
    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerSettings::default(),
            storage: "price_history.json".to_string(),
            routes_file: None,
            health: HealthSettings::default(),
            amadeus_url: flight_search::AmadeusConfig::TEST_BASE_URL.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        StorageBackend::parse(&self.storage)?;
        Ok(())
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Hours between polling cycles.
    pub interval_hours: u64,
    /// Local hour from which the daily digest is sent.
    pub digest_hour: u32,
    /// Departure dates searched, in days from today.
    pub search_horizon_days: Vec<u64>,
    pub search_pacing_ms: u64,
    pub dispatch_pacing_ms: u64,
    /// Back-off after a failed cycle, in minutes.
    pub error_backoff_minutes: u64,
    pub announce_startup: bool,
    /// Minimum savings under the route ceiling for a digest entry.
    pub min_savings_bps: i32,
    /// Minimum drop under the rolling average for an immediate alert.
    pub min_drop_bps: i32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_hours: 6,
            digest_hour: 9,
            search_horizon_days: vec![30, 60, 90],
            search_pacing_ms: 1000,
            dispatch_pacing_ms: 500,
            error_backoff_minutes: 30,
            announce_startup: true,
            min_savings_bps: 2000,
            min_drop_bps: 2000,
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=6).contains(&self.interval_hours) {
            return Err(ConfigError::InvalidValue {
                name: "interval_hours",
                value: format!("{} (expected 2 to 6)", self.interval_hours),
            });
        }
        if self.digest_hour > 23 {
            return Err(ConfigError::InvalidValue {
                name: "digest_hour",
                value: self.digest_hour.to_string(),
            });
        }
        if self.search_horizon_days.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "search_horizon_days",
                value: "[]".to_string(),
            });
        }
        for (name, bps) in [
            ("min_savings_bps", self.min_savings_bps),
            ("min_drop_bps", self.min_drop_bps),
        ] {
            if !(0..=10_000).contains(&bps) {
                return Err(ConfigError::InvalidValue {
                    name,
                    value: bps.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        SchedulerConfig {
            search_horizon_days: settings.search_horizon_days.clone(),
            search_pacing: Duration::from_millis(settings.search_pacing_ms),
            dispatch_pacing: Duration::from_millis(settings.dispatch_pacing_ms),
            poll_interval: Duration::from_secs(settings.interval_hours * 3600),
            error_backoff: Duration::from_secs(settings.error_backoff_minutes * 60),
            digest_hour: settings.digest_hour,
            announce_startup: settings.announce_startup,
            classifier: ClassifierConfig::from(settings),
        }
    }
}

impl From<&SchedulerSettings> for ClassifierConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        ClassifierConfig {
            min_savings_bps: settings.min_savings_bps,
            min_drop_bps: settings.min_drop_bps,
        }
    }
}

/// Liveness endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

/// Where price history lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Json(PathBuf),
    Sqlite(String),
    Memory,
}

impl StorageBackend {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        if url.eq_ignore_ascii_case("memory") {
            Ok(Self::Memory)
        } else if url.starts_with("sqlite:") {
            Ok(Self::Sqlite(url.to_string()))
        } else if url.ends_with(".json") {
            Ok(Self::Json(PathBuf::from(url)))
        } else {
            Err(ConfigError::InvalidValue {
                name: "storage",
                value: url.to_string(),
            })
        }
    }
}

/// Built-in catalog, or the routes in a JSON file. Every route is validated.
pub fn load_routes(routes_file: Option<&str>) -> Result<Vec<RoutePolicy>, ConfigError> {
    let routes = match routes_file {
        Some(path) => parse_routes(&std::fs::read_to_string(path)?)?,
        None => default_routes(),
    };
    Ok(routes)
}

pub fn parse_routes(json: &str) -> Result<Vec<RoutePolicy>, ConfigError> {
    let routes: Vec<RoutePolicy> = serde_json::from_str(json)?;
    if routes.is_empty() {
        return Err(ConfigError::InvalidRoute("route file is empty".to_string()));
    }
    for route in &routes {
        route.validate().map_err(ConfigError::InvalidRoute)?;
    }
    Ok(routes)
}
