//! Fixed-point fare amounts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("Empty price string")]
    Empty,
    #[error("Invalid price: {0}")]
    Invalid(String),
    #[error("Price has more than {max} decimal places: {value}")]
    TooPrecise { value: String, max: u32 },
    #[error("Price out of range: {0}")]
    Overflow(String),
}

/// Fixed-point non-negative amount with 8 decimal places.
/// Used for fares so that averages and ratios never go through floating point.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(pub u64);

impl Price {
    /// Number of decimal places.
    pub const DECIMALS: u32 = 8;
    /// Scale factor: 10^8.
    pub const SCALE: u64 = 100_000_000;
    pub const ZERO: Price = Price(0);

    /// Create from a whole amount (e.g. `Price::from_units(700)` for $700).
    pub const fn from_units(units: u64) -> Self {
        Self(units * Self::SCALE)
    }

    /// Create from an amount in cents.
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents * (Self::SCALE / 100))
    }

    /// Convert to f64 (for display only).
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Fraction by which `self` lies below `reference`, in basis points:
    /// (reference - self) / reference * 10000.
    ///
    /// Negative when `self` is above `reference`; zero when `reference` is zero.
    /// Truncates toward zero, so a result of 2000 means the true ratio is at least 0.20.
    /// Saturates at `i32::MIN` for prices far above the reference.
    pub fn discount_bps(self, reference: Price) -> i32 {
        if reference.0 == 0 {
            return 0;
        }
        let diff = reference.0 as i128 - self.0 as i128;
        let bps = (diff * BPS_SCALE as i128) / reference.0 as i128;
        bps.clamp(i32::MIN as i128, i32::MAX as i128) as i32
    }

    /// Arithmetic mean of a set of prices, `None` for an empty set.
    pub fn mean<'a>(prices: impl IntoIterator<Item = &'a Price>) -> Option<Price> {
        let (sum, count) = prices
            .into_iter()
            .fold((0u128, 0u128), |(sum, count), p| (sum + p.0 as u128, count + 1));
        if count == 0 {
            return None;
        }
        Some(Price((sum / count) as u64))
    }
}

impl Add for Price {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Price::ZERO, |acc, p| acc + p)
    }
}

impl FromStr for Price {
    type Err = PriceParseError;

    /// Parse a plain decimal string such as `"523.40"` or `"700"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PriceParseError::Empty);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(PriceParseError::Invalid(s.to_string()));
        }
        if frac.len() > Self::DECIMALS as usize {
            return Err(PriceParseError::TooPrecise {
                value: s.to_string(),
                max: Self::DECIMALS,
            });
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| PriceParseError::Overflow(s.to_string()))?
        };
        let frac_value: u64 = if frac.is_empty() {
            0
        } else {
            // Right-pad to DECIMALS digits: "4" -> 40000000
            let padded = format!("{:0<width$}", frac, width = Self::DECIMALS as usize);
            padded
                .parse()
                .map_err(|_| PriceParseError::Invalid(s.to_string()))?
        };

        whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac_value))
            .map(Price)
            .ok_or_else(|| PriceParseError::Overflow(s.to_string()))
    }
}

impl fmt::Display for Price {
    /// Two decimal places, rounded half up.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents_unit = Self::SCALE / 100;
        let cents = (self.0 + cents_unit / 2) / cents_unit;
        write!(f, "{}.{:02}", cents / 100, cents % 100)
    }
}

/// Convert basis points to a percentage (2500 -> 25.0).
pub fn bps_to_pct(bps: i32) -> f64 {
    bps as f64 / 100.0
}

/// Serde adapter that writes a [`Price`] as a decimal string and reads it from
/// a decimal string or a JSON number. Used for hand-edited files such as route catalogs.
pub mod decimal {
    use super::Price;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(price: &Price, serializer: S) -> Result<S::Ok, S::Error> {
        let whole = price.0 / Price::SCALE;
        let frac = price.0 % Price::SCALE;
        if frac == 0 {
            serializer.collect_str(&whole)
        } else {
            let frac = format!("{:08}", frac);
            serializer.collect_str(&format_args!("{}.{}", whole, frac.trim_end_matches('0')))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Price, D::Error> {
        deserializer.deserialize_any(PriceVisitor)
    }

    struct PriceVisitor;

    impl<'de> Visitor<'de> for PriceVisitor {
        type Value = Price;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative decimal price as a string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
            v.parse().map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
            v.checked_mul(Price::SCALE)
                .map(Price)
                .ok_or_else(|| E::custom(format!("price out of range: {}", v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
            u64::try_from(v)
                .map_err(|_| E::custom(format!("negative price: {}", v)))
                .and_then(|v| self.visit_u64(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
            if !v.is_finite() || v < 0.0 {
                return Err(E::custom(format!("invalid price: {}", v)));
            }
            // Round through an 8-decimal string so 523.4 becomes exactly 523.40000000
            format!("{:.8}", v).parse().map_err(E::custom)
        }
    }
}
