//! Amadeus Self-Service flight offers client.
//!
//! Authenticates with the OAuth2 client-credentials flow, caches the access
//! token until shortly before it expires, and maps the cheapest qualifying
//! flight offer to a [`FareQuote`].

use crate::{FlightSearchClient, SearchError, SearchRequest, SearchResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use flight_core::{FareQuote, Price};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the Amadeus client.
#[derive(Clone)]
pub struct AmadeusConfig {
    pub api_key: String,
    pub api_secret: String,
    /// API host, without a trailing path.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Refresh the token this long before the provider says it expires.
    pub token_refresh_margin: Duration,
    /// Number of offers requested per search.
    pub max_offers: u32,
    pub currency: String,
}

impl AmadeusConfig {
    pub const TEST_BASE_URL: &'static str = "https://test.api.amadeus.com";

    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: Self::TEST_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
            token_refresh_margin: Duration::from_secs(300),
            max_offers: 5,
            currency: "USD".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl std::fmt::Debug for AmadeusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmadeusConfig")
            .field("api_key", &mask(&self.api_key))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("max_offers", &self.max_offers)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}***", visible)
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(value: String, expires_in: Duration, margin: Duration, now: Instant) -> Self {
        Self {
            value,
            refresh_at: now + expires_in.saturating_sub(margin),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<Offer>,
}

#[derive(Debug, Deserialize)]
struct Offer {
    price: OfferPrice,
    #[serde(default)]
    itineraries: Vec<Itinerary>,
}

#[derive(Debug, Deserialize)]
struct OfferPrice {
    total: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct Itinerary {
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    departure: SegmentEndpoint,
    arrival: SegmentEndpoint,
    carrier_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentEndpoint {
    #[serde(default)]
    iata_code: Option<String>,
    at: String,
}

/// Parse a provider timestamp. Amadeus sends local times without an offset,
/// but an RFC 3339 timestamp (including a trailing `Z`) is also accepted.
fn parse_local_time(raw: &str) -> SearchResult<NaiveDateTime> {
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(t);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.naive_local())
        .map_err(|e| SearchError::ParseError(format!("bad timestamp '{}': {}", raw, e)))
}

impl Offer {
    fn to_quote(&self, request: &SearchRequest) -> SearchResult<FareQuote> {
        let price: Price = self
            .price
            .total
            .parse()
            .map_err(|e| SearchError::ParseError(format!("offer price: {}", e)))?;

        let segments = &self
            .itineraries
            .first()
            .ok_or_else(|| SearchError::ParseError("offer has no itineraries".to_string()))?
            .segments;
        let (first, last) = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SearchError::ParseError("itinerary has no segments".to_string())),
        };

        Ok(FareQuote {
            price,
            currency: self.price.currency.clone(),
            departure_at: parse_local_time(&first.departure.at)?,
            arrival_at: parse_local_time(&last.arrival.at)?,
            carrier: first.carrier_code.clone(),
            stop_count: segments.len().saturating_sub(1) as u32,
            origin: first
                .departure
                .iata_code
                .clone()
                .unwrap_or_else(|| request.origin.clone()),
            destination: last
                .arrival
                .iata_code
                .clone()
                .unwrap_or_else(|| request.destination.clone()),
        })
    }
}

/// Cheapest offer at or under the request's ceiling. Ties keep the first offer seen.
/// Malformed offers are skipped.
fn cheapest_offer(request: &SearchRequest, offers: &[Offer]) -> Option<FareQuote> {
    let mut best: Option<FareQuote> = None;
    for offer in offers {
        let quote = match offer.to_quote(request) {
            Ok(q) => q,
            Err(e) => {
                debug!(
                    origin = %request.origin,
                    destination = %request.destination,
                    error = %e,
                    "Skipping malformed offer"
                );
                continue;
            }
        };
        if quote.price > request.max_price {
            continue;
        }
        if best.as_ref().map_or(true, |b| quote.price < b.price) {
            best = Some(quote);
        }
    }
    best
}

/// Amadeus REST client.
pub struct AmadeusClient {
    config: AmadeusConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusClient {
    pub fn new(config: AmadeusConfig) -> SearchResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AmadeusConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> SearchResult<url::Url> {
        Ok(url::Url::parse(&self.config.base_url)?.join(path)?)
    }

    async fn request_token(&self) -> SearchResult<TokenResponse> {
        let url = self.endpoint("/v1/security/oauth2/token")?;
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.api_key.as_str()),
            ("client_secret", self.config.api_secret.as_str()),
        ];

        let response = self
            .http
            .post(url)
            .form(&params)
            .send()
            .await?;

        // Rejected credentials are an auth failure, an unreachable host is not
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::AuthenticationFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| SearchError::AuthenticationFailed(format!("bad token response: {}", e)))
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl FlightSearchClient for AmadeusClient {
    async fn authenticate(&self) -> SearchResult<String> {
        let mut cached = self.token.lock().await;
        let now = Instant::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let response = self.request_token().await?;
        let token = CachedToken::new(
            response.access_token,
            Duration::from_secs(response.expires_in),
            self.config.token_refresh_margin,
            now,
        );
        info!(
            expires_in_secs = response.expires_in,
            "Obtained Amadeus access token"
        );
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn search(&self, request: &SearchRequest) -> SearchResult<Option<FareQuote>> {
        let token = self.authenticate().await?;
        let url = self.endpoint("/v2/shopping/flight-offers")?;
        let departure = request.departure.format("%Y-%m-%d").to_string();
        let max_offers = self.config.max_offers.to_string();

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[
                ("originLocationCode", request.origin.as_str()),
                ("destinationLocationCode", request.destination.as_str()),
                ("departureDate", departure.as_str()),
                ("adults", "1"),
                ("max", max_offers.as_str()),
                ("currencyCode", self.config.currency.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            return Err(SearchError::AuthenticationFailed(
                "access token rejected".to_string(),
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                origin = %request.origin,
                destination = %request.destination,
                status = status.as_u16(),
                "Flight search returned non-success status"
            );
            return Err(SearchError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate(&body, 200).to_string(),
            });
        }

        let body = response.text().await?;
        let offers: OffersResponse = serde_json::from_str(&body)?;
        let best = cheapest_offer(request, &offers.data);

        debug!(
            origin = %request.origin,
            destination = %request.destination,
            date = %departure,
            offers = offers.data.len(),
            found = best.is_some(),
            "Flight search completed"
        );

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "data": [
            {
                "price": {"total": "812.10", "currency": "USD"},
                "itineraries": [{"segments": [
                    {"departure": {"iataCode": "EZE", "at": "2026-11-18T22:05:00"},
                     "arrival": {"iataCode": "JFK", "at": "2026-11-19T07:40:00"},
                     "carrierCode": "AA"}
                ]}]
            },
            {
                "price": {"total": "523.40", "currency": "USD"},
                "itineraries": [{"segments": [
                    {"departure": {"iataCode": "EZE", "at": "2026-11-18T09:15:00"},
                     "arrival": {"iataCode": "PTY", "at": "2026-11-18T15:00:00"},
                     "carrierCode": "CM"},
                    {"departure": {"iataCode": "PTY", "at": "2026-11-18T17:30:00"},
                     "arrival": {"iataCode": "JFK", "at": "2026-11-18T23:05:00"},
                     "carrierCode": "CM"}
                ]}]
            },
            {
                "price": {"total": "523.40", "currency": "USD"},
                "itineraries": [{"segments": [
                    {"departure": {"iataCode": "EZE", "at": "2026-11-18T11:00:00"},
                     "arrival": {"iataCode": "JFK", "at": "2026-11-18T21:00:00"},
                     "carrierCode": "DL"}
                ]}]
            }
        ]
    }"#;

    fn request(max_units: u64) -> SearchRequest {
        SearchRequest::new(
            "EZE",
            "JFK",
            NaiveDate::from_ymd_opt(2026, 11, 18).unwrap(),
            Price::from_units(max_units),
        )
    }

    fn sample_offers() -> Vec<Offer> {
        serde_json::from_str::<OffersResponse>(SAMPLE).unwrap().data
    }

    #[test]
    fn test_cheapest_offer_maps_fields() {
        let quote = cheapest_offer(&request(700), &sample_offers()).unwrap();
        assert_eq!(quote.price, Price::from_cents(52340));
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.carrier, "CM");
        assert_eq!(quote.stop_count, 1);
        assert_eq!(quote.origin, "EZE");
        assert_eq!(quote.destination, "JFK");
        assert_eq!(quote.departure_at.to_string(), "2026-11-18 09:15:00");
        assert_eq!(quote.arrival_at.to_string(), "2026-11-18 23:05:00");
    }

    #[test]
    fn test_cheapest_offer_respects_ceiling() {
        assert!(cheapest_offer(&request(500), &sample_offers()).is_none());
        let quote = cheapest_offer(&request(900), &sample_offers()).unwrap();
        assert_eq!(quote.price, Price::from_cents(52340));
    }

    #[test]
    fn test_cheapest_offer_skips_malformed() {
        let json = r#"{"data": [
            {"price": {"total": "abc", "currency": "USD"}, "itineraries": []},
            {"price": {"total": "100.00", "currency": "USD"}, "itineraries": []}
        ]}"#;
        let offers = serde_json::from_str::<OffersResponse>(json).unwrap().data;
        assert!(cheapest_offer(&request(700), &offers).is_none());
    }

    #[test]
    fn test_empty_response_has_no_offers() {
        let offers: OffersResponse = serde_json::from_str("{}").unwrap();
        assert!(offers.data.is_empty());
    }

    #[test]
    fn test_parse_local_time_accepts_utc_suffix() {
        let t = parse_local_time("2026-11-18T22:05:00Z").unwrap();
        assert_eq!(t.to_string(), "2026-11-18 22:05:00");
        assert!(parse_local_time("yesterday").is_err());
    }

    #[test]
    fn test_cached_token_refreshes_before_expiry() {
        let now = Instant::now();
        let token = CachedToken::new(
            "abc".to_string(),
            Duration::from_secs(1799),
            Duration::from_secs(300),
            now,
        );
        assert!(token.is_fresh(now));
        assert!(token.is_fresh(now + Duration::from_secs(1498)));
        assert!(!token.is_fresh(now + Duration::from_secs(1499)));

        // A token shorter-lived than the margin is never reused
        let short = CachedToken::new(
            "abc".to_string(),
            Duration::from_secs(60),
            Duration::from_secs(300),
            now,
        );
        assert!(!short.is_fresh(now));
    }

    #[test]
    fn test_config_debug_masks_secret() {
        let config = AmadeusConfig::new("ABCDEFGH", "supersecret");
        let debug = format!("{:?}", config);
        assert!(debug.contains("ABCD***"));
        assert!(!debug.contains("supersecret"));
        assert!(!debug.contains("EFGH"));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_is_not_auth_failure() {
        let client = AmadeusClient::new(
            AmadeusConfig::new("k", "s").with_base_url("http://127.0.0.1:1"),
        )
        .unwrap();
        let err = client.authenticate().await.unwrap_err();
        assert!(!err.is_auth(), "unexpected auth failure: {}", err);
        assert!(matches!(
            err,
            SearchError::RequestFailed(_) | SearchError::Timeout(_)
        ));

        let err = client.search(&request(700)).await.unwrap_err();
        assert!(!err.is_auth());
    }

    #[test]
    fn test_endpoint_join() {
        let client = AmadeusClient::new(
            AmadeusConfig::new("k", "s").with_base_url("https://example.test"),
        )
        .unwrap();
        assert_eq!(
            client.endpoint("/v2/shopping/flight-offers").unwrap().as_str(),
            "https://example.test/v2/shopping/flight-offers"
        );
    }
}
