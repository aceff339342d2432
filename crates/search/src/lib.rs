//! Flight fare search.
//!
//! This crate provides:
//! - The `FlightSearchClient` trait the scheduler searches through
//! - An Amadeus REST implementation with token caching
//! - A scripted mock client for tests

pub mod amadeus;
pub mod client;
pub mod error;
pub mod mock;

pub use amadeus::{AmadeusClient, AmadeusConfig};
pub use client::{FlightSearchClient, SearchRequest};
pub use error::{SearchError, SearchResult};
pub use mock::{MockResponse, MockSearchClient};
