//! Flight Alert Bot - Headless Server
//!
//! Polls fare prices for a catalog of routes from Buenos Aires and sends
//! deal alerts to a Telegram chat.

mod config;
mod health;

use clap::Parser;
use config::{load_routes, AppConfig, ConfigError, Credentials, StorageBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flight_alerts::{TelegramConfig, TelegramDispatcher};
use flight_engine::{
    AlertScheduler, JsonFileStorage, MemoryStorage, ObservationStorage, PriceObservationStore,
    SqliteStorage, StoreConfig, SystemClock,
};
use flight_search::{AmadeusClient, AmadeusConfig};

/// Flight Alert Bot CLI
#[derive(Parser, Debug)]
#[command(name = "flight-alert-bot")]
#[command(about = "Flight deal alerts from Buenos Aires over Telegram", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Price history location: path ending in .json, sqlite: URL, or "memory"
    #[arg(short, long, env = "STORAGE_URL", default_value = "price_history.json")]
    storage: String,

    /// Hours between search cycles (2-6)
    #[arg(short, long, env = "POLL_INTERVAL_HOURS", default_value_t = 6)]
    interval_hours: u64,

    /// Local hour from which the daily digest is sent
    #[arg(short, long, env = "DIGEST_HOUR", default_value_t = 9)]
    digest_hour: u32,

    /// JSON file with the route catalog (built-in catalog if omitted)
    #[arg(short, long, env = "ROUTES_FILE")]
    routes: Option<String>,

    /// Port for the /health endpoint
    #[arg(long, env = "PORT", default_value_t = 8080)]
    health_port: u16,

    /// Do not start the /health endpoint
    #[arg(long, default_value_t = false)]
    no_health: bool,

    /// Amadeus API host
    #[arg(long, env = "AMADEUS_BASE_URL", default_value = AmadeusConfig::TEST_BASE_URL)]
    amadeus_url: String,
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: &str) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn build_config(args: &Args) -> AppConfig {
    let mut config = AppConfig::default();
    config.scheduler.interval_hours = args.interval_hours;
    config.scheduler.digest_hour = args.digest_hour;
    config.storage = args.storage.clone();
    config.routes_file = args.routes.clone();
    config.health.enabled = !args.no_health;
    config.health.port = args.health_port;
    config.amadeus_url = args.amadeus_url.clone();
    config.log_level = args.log_level.clone();
    config
}

/// Open the configured history backend. Storage problems never stop the bot:
/// an unusable database degrades to in-memory history.
async fn open_storage(backend: &StorageBackend) -> Box<dyn ObservationStorage> {
    match backend {
        StorageBackend::Json(path) => Box::new(JsonFileStorage::new(path.clone())),
        StorageBackend::Sqlite(url) => match SqliteStorage::connect_or_recover(url).await {
            Ok(db) => Box::new(db),
            Err(e) => {
                warn!("SQLite storage unavailable ({}); price history will not survive a restart", e);
                Box::new(MemoryStorage::new())
            }
        },
        StorageBackend::Memory => {
            warn!("Using in-memory price history; it will be lost on restart");
            Box::new(MemoryStorage::new())
        }
    }
}

async fn run(config: AppConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let credentials = Credentials::from_env()?;
    let routes = load_routes(config.routes_file.as_deref())?;

    info!("  Routes: {}", routes.len());
    info!("  Interval: {}h", config.scheduler.interval_hours);
    info!("  Digest hour: {:02}:00", config.scheduler.digest_hour);
    info!("  Storage: {}", config.storage);
    info!("  Amadeus: {}", config.amadeus_url);

    let search = AmadeusClient::new(
        AmadeusConfig::new(&credentials.amadeus_api_key, &credentials.amadeus_api_secret)
            .with_base_url(&config.amadeus_url),
    )?;
    let dispatcher = TelegramDispatcher::new(&TelegramConfig::new(
        &credentials.telegram_bot_token,
        &credentials.telegram_chat_id,
    ))?;

    let storage = open_storage(&StorageBackend::parse(&config.storage)?).await;
    let store = PriceObservationStore::open(StoreConfig::default(), storage).await;
    info!("  Tracked route keys: {}", store.len());

    let cancel = CancellationToken::new();

    let health_handle = if config.health.enabled {
        match health::start_health_server(config.health.port, cancel.clone()).await {
            Ok((_, handle)) => Some(handle),
            Err(e) => {
                warn!("Failed to start health endpoint: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut scheduler = AlertScheduler::new(
        (&config.scheduler).into(),
        routes,
        Arc::new(search),
        Arc::new(dispatcher),
        Arc::new(SystemClock),
        store,
    );
    let scheduler_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    cancel.cancel();

    // An in-flight search may take up to its own timeout to return
    if tokio::time::timeout(Duration::from_secs(20), scheduler_handle)
        .await
        .is_err()
    {
        warn!("Scheduler did not stop in time");
    }
    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    info!("✈️ Flight Alert Bot starting...");

    if let Err(e) = run(build_config(&args)).await {
        error!("Startup failed: {}", e);
        std::process::exit(1);
    }

    info!("👋 Flight Alert Bot stopped");
}
