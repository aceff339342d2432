//! Scripted search client for testing.

use crate::{FlightSearchClient, SearchError, SearchRequest, SearchResult};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use flight_core::{FareQuote, Price};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// What the mock answers for a given origin/destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    Fare(Price),
    NoFare,
    AuthFailure,
    TransportFailure,
}

type RouteId = (String, String);

/// Mock flight search client.
///
/// Responses are keyed by (origin, destination), optionally refined per
/// departure date. Unknown routes return no fare. Fares above the request's
/// ceiling are filtered out, as a real client would.
#[derive(Debug, Default)]
pub struct MockSearchClient {
    responses: Mutex<HashMap<RouteId, MockResponse>>,
    dated: Mutex<HashMap<(RouteId, NaiveDate), MockResponse>>,
    calls: Mutex<Vec<SearchRequest>>,
    auth_calls: AtomicU32,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for every date on a route (builder pattern).
    pub fn with_response(self, origin: &str, destination: &str, response: MockResponse) -> Self {
        self.set_response(origin, destination, response);
        self
    }

    /// Set a fare for every date on a route (builder pattern).
    pub fn with_fare(self, origin: &str, destination: &str, price: Price) -> Self {
        self.with_response(origin, destination, MockResponse::Fare(price))
    }

    /// Set the response for one departure date on a route (builder pattern).
    pub fn with_dated_response(
        self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
        response: MockResponse,
    ) -> Self {
        if let Ok(mut dated) = self.dated.lock() {
            dated.insert(((origin.to_string(), destination.to_string()), date), response);
        }
        self
    }

    /// Replace the response for a route, e.g. between scheduler cycles.
    pub fn set_response(&self, origin: &str, destination: &str, response: MockResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert((origin.to_string(), destination.to_string()), response);
        }
    }

    /// All search requests received so far, in order.
    pub fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn auth_call_count(&self) -> u32 {
        self.auth_calls.load(Ordering::Relaxed)
    }

    fn response_for(&self, request: &SearchRequest) -> MockResponse {
        let route = (request.origin.clone(), request.destination.clone());
        if let Some(r) = self
            .dated
            .lock()
            .ok()
            .and_then(|d| d.get(&(route.clone(), request.departure)).cloned())
        {
            return r;
        }
        self.responses
            .lock()
            .ok()
            .and_then(|r| r.get(&route).cloned())
            .unwrap_or(MockResponse::NoFare)
    }
}

/// Build a plausible quote for a request at the given price.
pub fn quote_for(request: &SearchRequest, price: Price) -> FareQuote {
    let departure_at = request
        .departure
        .and_hms_opt(10, 0, 0)
        .unwrap_or_default();
    FareQuote {
        price,
        currency: "USD".to_string(),
        departure_at,
        arrival_at: departure_at + Duration::hours(12),
        carrier: "XX".to_string(),
        stop_count: 0,
        origin: request.origin.clone(),
        destination: request.destination.clone(),
    }
}

#[async_trait]
impl FlightSearchClient for MockSearchClient {
    async fn authenticate(&self) -> SearchResult<String> {
        self.auth_calls.fetch_add(1, Ordering::Relaxed);
        Ok("mock-token".to_string())
    }

    async fn search(&self, request: &SearchRequest) -> SearchResult<Option<FareQuote>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        match self.response_for(request) {
            MockResponse::Fare(price) if price <= request.max_price => {
                Ok(Some(quote_for(request, price)))
            }
            MockResponse::Fare(_) | MockResponse::NoFare => Ok(None),
            MockResponse::AuthFailure => Err(SearchError::AuthenticationFailed(
                "mock credentials rejected".to_string(),
            )),
            MockResponse::TransportFailure => {
                Err(SearchError::RequestFailed("mock connection reset".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, d).unwrap()
    }

    #[tokio::test]
    async fn test_mock_returns_scripted_fares() {
        let client = MockSearchClient::new()
            .with_fare("EZE", "JFK", Price::from_units(500))
            .with_dated_response("EZE", "JFK", day(2), MockResponse::TransportFailure);

        let req = SearchRequest::new("EZE", "JFK", day(1), Price::from_units(700));
        let quote = client.search(&req).await.unwrap().unwrap();
        assert_eq!(quote.price, Price::from_units(500));
        assert_eq!(quote.route_key().to_string(), "EZE-JFK-2026-11-01");

        let req = SearchRequest::new("EZE", "JFK", day(2), Price::from_units(700));
        assert!(client.search(&req).await.is_err());

        let req = SearchRequest::new("AEP", "JFK", day(1), Price::from_units(700));
        assert!(client.search(&req).await.unwrap().is_none());

        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_filters_by_ceiling() {
        let client = MockSearchClient::new().with_fare("EZE", "GRU", Price::from_units(200));
        let req = SearchRequest::new("EZE", "GRU", day(1), Price::from_units(150));
        assert!(client.search(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_auth_failure() {
        let client =
            MockSearchClient::new().with_response("EZE", "GRU", MockResponse::AuthFailure);
        let req = SearchRequest::new("EZE", "GRU", day(1), Price::from_units(150));
        assert!(client.search(&req).await.unwrap_err().is_auth());
        assert_eq!(client.authenticate().await.unwrap(), "mock-token");
        assert_eq!(client.auth_call_count(), 1);
    }
}
