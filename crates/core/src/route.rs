//! Route identifiers and per-route alert policy.

use crate::Price;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteKeyError {
    #[error("Malformed route key: {0}")]
    Malformed(String),
    #[error("Invalid departure date in route key: {0}")]
    InvalidDate(String),
}

/// Identifies one origin-destination-date fare series.
///
/// Canonical string form is `ORIGIN-DEST-YYYY-MM-DD`, e.g. `EZE-JFK-2026-11-18`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDate,
}

impl RouteKey {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure: NaiveDate,
    ) -> Self {
        Self {
            origin: origin.into().to_ascii_uppercase(),
            destination: destination.into().to_ascii_uppercase(),
            departure,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.origin,
            self.destination,
            self.departure.format("%Y-%m-%d")
        )
    }
}

impl FromStr for RouteKey {
    type Err = RouteKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(origin), Some(destination), Some(date)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(RouteKeyError::Malformed(s.to_string()));
        };
        if origin.is_empty() || destination.is_empty() {
            return Err(RouteKeyError::Malformed(s.to_string()));
        }
        let departure = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| RouteKeyError::InvalidDate(s.to_string()))?;
        Ok(Self::new(origin, destination, departure))
    }
}

impl Serialize for RouteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RouteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Geographic grouping used to lay out the daily digest.
/// Declaration order is the order regions appear in a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    UnitedStates,
    Europe,
    Asia,
    Brazil,
    Chile,
    Argentina,
}

impl Region {
    pub fn label(self) -> &'static str {
        match self {
            Region::UnitedStates => "United States",
            Region::Europe => "Europe",
            Region::Asia => "Asia",
            Region::Brazil => "Brazil",
            Region::Chile => "Chile",
            Region::Argentina => "Argentina",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Region::UnitedStates => "🇺🇸",
            Region::Europe => "🇪🇺",
            Region::Asia => "🌏",
            Region::Brazil => "🇧🇷",
            Region::Chile => "🇨🇱",
            Region::Argentina => "🇦🇷",
        }
    }
}

/// Alert policy for one destination: which origins to search and the fare ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Origin airport codes to search from.
    pub origins: Vec<String>,
    /// Destination airport code.
    pub destination: String,
    /// Human-readable destination name.
    pub display_name: String,
    pub region: Region,
    /// Fares above this are never considered.
    #[serde(with = "crate::price::decimal")]
    pub max_price: Price,
}

impl RoutePolicy {
    pub fn new(
        origins: &[&str],
        destination: &str,
        display_name: &str,
        region: Region,
        max_price: Price,
    ) -> Self {
        Self {
            origins: origins.iter().map(|o| o.to_string()).collect(),
            destination: destination.to_string(),
            display_name: display_name.to_string(),
            region,
            max_price,
        }
    }

    /// Check the static invariants of a policy: at least one origin and a positive ceiling.
    pub fn validate(&self) -> Result<(), String> {
        if self.origins.is_empty() {
            return Err(format!("route to {} has no origins", self.destination));
        }
        if self.destination.trim().is_empty() {
            return Err(format!("route '{}' has no destination", self.display_name));
        }
        if self.max_price.is_zero() {
            return Err(format!("route to {} has a zero max_price", self.destination));
        }
        Ok(())
    }
}
