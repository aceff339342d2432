//! Polling loop: search every route, classify the best fares, dispatch alerts.
//!
//! One cycle runs SEARCH, CLASSIFY and DISPATCH in order, then the loop waits
//! for the poll interval (or the error back-off after a failed cycle). Price
//! drops go out immediately; digest deals are held until the daily gate opens.

use crate::classifier::{ClassifierConfig, DealClassifier};
use crate::clock::Clock;
use crate::store::PriceObservationStore;
use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use flight_alerts::{format_digest, format_drop_alert, format_startup, NotificationDispatcher};
use flight_core::{Alert, FareQuote, Region, RoutePolicy};
use flight_search::{FlightSearchClient, SearchRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Scheduler timing and behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Departure dates searched, in days from today.
    pub search_horizon_days: Vec<u64>,
    /// Delay between consecutive search calls.
    pub search_pacing: Duration,
    /// Delay between consecutive notifications.
    pub dispatch_pacing: Duration,
    /// Wait after a successful cycle.
    pub poll_interval: Duration,
    /// Wait after a failed cycle.
    pub error_backoff: Duration,
    /// Local hour from which the daily digest may go out.
    pub digest_hour: u32,
    /// Send a "bot is running" message before the first cycle.
    pub announce_startup: bool,
    pub classifier: ClassifierConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            search_horizon_days: vec![30, 60, 90],
            search_pacing: Duration::from_secs(1),
            dispatch_pacing: Duration::from_millis(500),
            poll_interval: Duration::from_secs(6 * 3600),
            error_backoff: Duration::from_secs(30 * 60),
            digest_hour: 9,
            announce_startup: true,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Where the scheduler currently is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Searching,
    Classifying,
    Dispatching,
    Waiting,
    Backoff,
}

/// Mutable scheduler state that outlives a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// Local date on which the digest gate last opened.
    pub last_digest_date: Option<NaiveDate>,
}

impl SchedulerState {
    /// The gate opens once per calendar day, from `digest_hour` on.
    pub fn digest_due(&self, local_now: NaiveDateTime, digest_hour: u32) -> bool {
        local_now.hour() >= digest_hour && self.last_digest_date != Some(local_now.date())
    }

    pub fn open_digest_gate(&mut self, today: NaiveDate) {
        self.last_digest_date = Some(today);
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Flight search unavailable: all {0} search calls failed")]
    SearchUnavailable(u32),
    #[error("Cycle cancelled")]
    Cancelled,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub searches: u32,
    pub search_failures: u32,
    pub auth_failures: u32,
    pub fares_found: u32,
    pub persistence_failures: u32,
    pub digest_pending: usize,
    pub drops_sent: u32,
    pub drops_failed: u32,
    pub digest_sent: bool,
}

/// Drives the polling loop. Owns the price store, the digest gate and the pending digest.
pub struct AlertScheduler {
    config: SchedulerConfig,
    routes: Vec<RoutePolicy>,
    search: Arc<dyn FlightSearchClient>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    store: PriceObservationStore,
    classifier: DealClassifier,
    state: SchedulerState,
    pending_digest: BTreeMap<Region, Vec<Alert>>,
    phase: SchedulerPhase,
}

impl AlertScheduler {
    pub fn new(
        config: SchedulerConfig,
        routes: Vec<RoutePolicy>,
        search: Arc<dyn FlightSearchClient>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        store: PriceObservationStore,
    ) -> Self {
        let classifier = DealClassifier::new(config.classifier);
        Self {
            config,
            routes,
            search,
            dispatcher,
            clock,
            store,
            classifier,
            state: SchedulerState::default(),
            pending_digest: BTreeMap::new(),
            phase: SchedulerPhase::Idle,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn store(&self) -> &PriceObservationStore {
        &self.store
    }

    pub fn routes(&self) -> &[RoutePolicy] {
        &self.routes
    }

    /// Deals held for the next digest, grouped by region.
    pub fn pending_digest(&self) -> &BTreeMap<Region, Vec<Alert>> {
        &self.pending_digest
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            routes = self.routes.len(),
            interval_secs = self.config.poll_interval.as_secs(),
            digest_hour = self.config.digest_hour,
            "Starting alert scheduler"
        );

        if self.config.announce_startup && !cancel.is_cancelled() {
            self.announce_startup().await;
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let delay = match self.run_cycle(&cancel).await {
                Ok(report) => {
                    info!(
                        searches = report.searches,
                        search_failures = report.search_failures,
                        auth_failures = report.auth_failures,
                        fares = report.fares_found,
                        persistence_failures = report.persistence_failures,
                        pending = report.digest_pending,
                        drops_sent = report.drops_sent,
                        digest_sent = report.digest_sent,
                        "Cycle complete"
                    );
                    self.phase = SchedulerPhase::Waiting;
                    self.config.poll_interval
                }
                Err(SchedulerError::Cancelled) => break,
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_secs = self.config.error_backoff.as_secs(),
                        "Cycle failed, backing off"
                    );
                    self.phase = SchedulerPhase::Backoff;
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.phase = SchedulerPhase::Idle;
        info!("Alert scheduler stopped");
    }

    /// One SEARCH → CLASSIFY → DISPATCH pass.
    pub async fn run_cycle(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, SchedulerError> {
        let mut report = CycleReport::default();

        self.phase = SchedulerPhase::Searching;
        let best = self.search_best_fares(cancel, &mut report).await?;

        if report.searches > 0 && report.search_failures == report.searches {
            return Err(SchedulerError::SearchUnavailable(report.search_failures));
        }

        self.phase = SchedulerPhase::Classifying;
        let drops = self.classify_fares(best, &mut report).await;
        report.digest_pending = self.pending_digest.values().map(Vec::len).sum();

        self.phase = SchedulerPhase::Dispatching;
        self.dispatch(drops, &mut report).await;

        Ok(report)
    }

    async fn announce_startup(&self) {
        let text = format_startup(
            self.routes.len(),
            self.config.poll_interval,
            self.config.digest_hour,
        );
        if let Err(e) = self.dispatcher.send(&text).await {
            warn!(error = %e, "Failed to send startup message");
        }
    }

    /// Cheapest fare per route across all origins and horizon dates.
    async fn search_best_fares(
        &self,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<Vec<(RoutePolicy, FareQuote)>, SchedulerError> {
        let today = self.clock.local_now().date();
        let mut best_fares = Vec::new();
        let mut first_call = true;

        for policy in &self.routes {
            let mut best: Option<FareQuote> = None;

            'origins: for origin in &policy.origins {
                for &days in &self.config.search_horizon_days {
                    let Some(departure) = today.checked_add_days(Days::new(days)) else {
                        continue;
                    };

                    if !first_call {
                        self.pause(self.config.search_pacing, cancel).await?;
                    }
                    if cancel.is_cancelled() {
                        return Err(SchedulerError::Cancelled);
                    }
                    first_call = false;

                    let request = SearchRequest::new(
                        origin.as_str(),
                        policy.destination.as_str(),
                        departure,
                        policy.max_price,
                    );
                    report.searches += 1;

                    match self.search.search(&request).await {
                        Ok(Some(quote)) => {
                            debug!(
                                route = %policy.destination,
                                origin = %origin,
                                date = %departure,
                                price = %quote.price,
                                "Fare found"
                            );
                            if best.as_ref().map_or(true, |b| quote.price < b.price) {
                                best = Some(quote);
                            }
                        }
                        Ok(None) => {}
                        Err(e) if e.is_auth() => {
                            report.auth_failures += 1;
                            warn!(route = %policy.destination, error = %e, "Authentication failed, skipping route");
                            break 'origins;
                        }
                        Err(e) => {
                            report.search_failures += 1;
                            warn!(
                                route = %policy.destination,
                                origin = %origin,
                                date = %departure,
                                error = %e,
                                "Search failed"
                            );
                        }
                    }
                }
            }

            if let Some(quote) = best {
                report.fares_found += 1;
                best_fares.push((policy.clone(), quote));
            }
        }

        Ok(best_fares)
    }

    /// Record each best fare, then classify it against the updated baseline.
    /// Digest deals are held; drop alerts are returned for immediate dispatch.
    async fn classify_fares(
        &mut self,
        fares: Vec<(RoutePolicy, FareQuote)>,
        report: &mut CycleReport,
    ) -> Vec<Alert> {
        let mut drops = Vec::new();

        for (policy, quote) in fares {
            let key = quote.route_key();
            let observation = quote.observe(self.clock.now());
            if let Err(e) = self.store.record(key.clone(), observation).await {
                report.persistence_failures += 1;
                warn!(key = %key, error = %e, "Failed to persist price history");
            }

            let baseline = self.store.average(&key);
            for alert in self.classifier.classify(&policy, &quote, baseline) {
                if alert.is_drop() {
                    drops.push(alert);
                } else {
                    self.hold_for_digest(alert);
                }
            }
        }

        drops
    }

    /// Keep at most one deal per destination: the cheapest seen since the last digest.
    fn hold_for_digest(&mut self, alert: Alert) {
        let section = self.pending_digest.entry(alert.route.region).or_default();
        match section
            .iter_mut()
            .find(|held| held.route.destination == alert.route.destination)
        {
            Some(held) if alert.fare.price < held.fare.price => *held = alert,
            Some(_) => return,
            None => section.push(alert),
        }
        section.sort_by_key(|a| a.fare.price);
    }

    async fn dispatch(&mut self, drops: Vec<Alert>, report: &mut CycleReport) {
        let mut first_send = true;

        for alert in &drops {
            if !first_send {
                tokio::time::sleep(self.config.dispatch_pacing).await;
            }
            first_send = false;

            match self.dispatcher.send(&format_drop_alert(alert)).await {
                Ok(()) => {
                    report.drops_sent += 1;
                    info!(route = %alert.route.destination, price = %alert.fare.price, "Price drop alert sent");
                }
                Err(e) => {
                    report.drops_failed += 1;
                    error!(route = %alert.route.destination, error = %e, "Failed to send price drop alert");
                }
            }
        }

        let now = self.clock.local_now();
        if !self.state.digest_due(now, self.config.digest_hour) {
            return;
        }

        // the gate advances whether or not delivery succeeds
        let today = now.date();
        self.state.open_digest_gate(today);
        let sections = std::mem::take(&mut self.pending_digest);
        let deal_count: usize = sections.values().map(Vec::len).sum();

        if !first_send {
            tokio::time::sleep(self.config.dispatch_pacing).await;
        }
        let message = format_digest(&sections, today, self.config.classifier.min_savings_bps);
        match self.dispatcher.send(&message).await {
            Ok(()) => {
                report.digest_sent = true;
                info!(deals = deal_count, date = %today, "Daily digest sent");
            }
            Err(e) => {
                error!(deals = deal_count, error = %e, "Failed to send daily digest");
            }
        }
    }

    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> Result<(), SchedulerError> {
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(SchedulerError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl std::fmt::Debug for AlertScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertScheduler")
            .field("routes", &self.routes.len())
            .field("phase", &self.phase)
            .field("state", &self.state)
            .field("store", &self.store)
            .finish()
    }
}
