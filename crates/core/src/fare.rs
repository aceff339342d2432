//! Fare search results and recorded price observations.

use crate::{Price, RouteKey};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cheapest qualifying fare returned by one search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareQuote {
    pub price: Price,
    /// ISO currency code, e.g. "USD".
    pub currency: String,
    /// Local departure time at the origin airport.
    pub departure_at: NaiveDateTime,
    /// Local arrival time at the destination airport.
    pub arrival_at: NaiveDateTime,
    /// Marketing carrier code of the first segment, e.g. "AA".
    pub carrier: String,
    pub stop_count: u32,
    pub origin: String,
    pub destination: String,
}

impl FareQuote {
    /// Series key this quote belongs to.
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(
            self.origin.as_str(),
            self.destination.as_str(),
            self.departure_at.date(),
        )
    }

    /// Observation to record for this quote.
    pub fn observe(&self, observed_at: DateTime<Utc>) -> PriceObservation {
        PriceObservation {
            price: self.price,
            currency: self.currency.clone(),
            observed_at,
        }
    }
}

/// One recorded price point in a route's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub price: Price,
    pub currency: String,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(price: Price, currency: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            price,
            currency: currency.into(),
            observed_at,
        }
    }
}
