//! Flight search client abstraction.

use crate::SearchResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use flight_core::{FareQuote, Price};

/// One fare query: cheapest one-way fare for a single adult.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDate,
    /// Offers above this price are discarded by the client.
    pub max_price: Price,
}

impl SearchRequest {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure: NaiveDate,
        max_price: Price,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            departure,
            max_price,
        }
    }
}

/// Trait for fare provider clients.
#[async_trait]
pub trait FlightSearchClient: Send + Sync {
    /// Obtain (or reuse) an access token.
    async fn authenticate(&self) -> SearchResult<String>;

    /// Cheapest fare at or under `request.max_price`, or `None` when nothing qualifies.
    async fn search(&self, request: &SearchRequest) -> SearchResult<Option<FareQuote>>;
}
