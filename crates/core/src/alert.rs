//! Classified deal alerts.

use crate::{bps_to_pct, FareQuote, Price, RoutePolicy};
use serde::{Deserialize, Serialize};

/// Why a fare was flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    /// Fare is well under the route's ceiling; held for the daily digest.
    Digest {
        /// (max_price - price) / max_price in basis points.
        savings_bps: i32,
    },
    /// Fare fell sharply below the route's rolling average; sent immediately.
    Drop {
        baseline_average: Price,
        /// (baseline - price) / baseline in basis points.
        drop_bps: i32,
    },
}

/// A fare flagged for notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub route: RoutePolicy,
    pub fare: FareQuote,
}

impl Alert {
    pub fn digest(route: RoutePolicy, fare: FareQuote, savings_bps: i32) -> Self {
        Self {
            kind: AlertKind::Digest { savings_bps },
            route,
            fare,
        }
    }

    pub fn price_drop(
        route: RoutePolicy,
        fare: FareQuote,
        baseline_average: Price,
        drop_bps: i32,
    ) -> Self {
        Self {
            kind: AlertKind::Drop {
                baseline_average,
                drop_bps,
            },
            route,
            fare,
        }
    }

    pub fn is_digest(&self) -> bool {
        matches!(self.kind, AlertKind::Digest { .. })
    }

    pub fn is_drop(&self) -> bool {
        matches!(self.kind, AlertKind::Drop { .. })
    }

    /// Baseline average, for drop alerts only.
    pub fn baseline_average(&self) -> Option<Price> {
        match self.kind {
            AlertKind::Drop {
                baseline_average, ..
            } => Some(baseline_average),
            AlertKind::Digest { .. } => None,
        }
    }

    /// Drop ratio as a percentage (25.0 for a 25% drop), for drop alerts only.
    pub fn drop_pct(&self) -> Option<f64> {
        match self.kind {
            AlertKind::Drop { drop_bps, .. } => Some(bps_to_pct(drop_bps)),
            AlertKind::Digest { .. } => None,
        }
    }

    /// Savings against the route ceiling as a percentage.
    pub fn savings_pct(&self) -> f64 {
        match self.kind {
            AlertKind::Digest { savings_bps } => bps_to_pct(savings_bps),
            AlertKind::Drop { .. } => {
                bps_to_pct(self.fare.price.discount_bps(self.route.max_price))
            }
        }
    }
}
