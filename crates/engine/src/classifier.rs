//! Deal classification.
//!
//! A fare can qualify two independent ways:
//! - **Digest**: it undercuts the route's ceiling by at least `min_savings_bps`.
//! - **Drop**: it undercuts the route's rolling average by at least `min_drop_bps`.

use flight_core::{Alert, FareQuote, Price, RoutePolicy};

/// 20%, the default for both thresholds.
pub const DEFAULT_MIN_SAVINGS_BPS: i32 = 2000;
pub const DEFAULT_MIN_DROP_BPS: i32 = 2000;

/// Thresholds for the classifier, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Minimum (max_price - price) / max_price for a digest alert.
    pub min_savings_bps: i32,
    /// Minimum (baseline - price) / baseline for a drop alert.
    pub min_drop_bps: i32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_savings_bps: DEFAULT_MIN_SAVINGS_BPS,
            min_drop_bps: DEFAULT_MIN_DROP_BPS,
        }
    }
}

/// Stateless classifier: identical inputs always produce identical alerts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DealClassifier {
    config: ClassifierConfig,
}

impl DealClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one fare. Returns zero, one or two alerts (digest first).
    ///
    /// `baseline` is the route's rolling average, `None` while the history is too short.
    pub fn classify(
        &self,
        policy: &RoutePolicy,
        quote: &FareQuote,
        baseline: Option<Price>,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if !policy.max_price.is_zero() {
            let savings_bps = quote.price.discount_bps(policy.max_price);
            if savings_bps >= self.config.min_savings_bps {
                alerts.push(Alert::digest(policy.clone(), quote.clone(), savings_bps));
            }
        }

        if let Some(baseline) = baseline.filter(|b| quote.price < *b) {
            let drop_bps = quote.price.discount_bps(baseline);
            if drop_bps >= self.config.min_drop_bps {
                alerts.push(Alert::price_drop(
                    policy.clone(),
                    quote.clone(),
                    baseline,
                    drop_bps,
                ));
            }
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use flight_core::{AlertKind, Region, BUENOS_AIRES};
    use pretty_assertions::assert_eq;

    fn policy(max: u64) -> RoutePolicy {
        RoutePolicy::new(
            &BUENOS_AIRES,
            "JFK",
            "New York",
            Region::UnitedStates,
            Price::from_units(max),
        )
    }

    fn quote(price: Price) -> FareQuote {
        let day = NaiveDate::from_ymd_opt(2026, 11, 18).unwrap();
        FareQuote {
            price,
            currency: "USD".to_string(),
            departure_at: day.and_hms_opt(9, 0, 0).unwrap(),
            arrival_at: day.and_hms_opt(21, 0, 0).unwrap(),
            carrier: "AA".to_string(),
            stop_count: 0,
            origin: "EZE".to_string(),
            destination: "JFK".to_string(),
        }
    }

    #[test]
    fn test_digest_without_baseline() {
        let alerts = DealClassifier::default().classify(
            &policy(700),
            &quote(Price::from_units(500)),
            None,
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Digest { savings_bps: 2857 });
        assert!(!alerts.iter().any(Alert::is_drop));
    }

    #[test]
    fn test_drop_against_baseline() {
        // 450 is only 10% under the 500 ceiling: no digest, but 25% under the average
        let alerts = DealClassifier::default().classify(
            &policy(500),
            &quote(Price::from_units(450)),
            Some(Price::from_units(600)),
        );
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert!(alert.is_drop());
        assert_eq!(alert.baseline_average(), Some(Price::from_units(600)));
        assert_eq!(alert.drop_pct(), Some(25.0));
    }

    #[test]
    fn test_both_alerts_fire_together() {
        let alerts = DealClassifier::default().classify(
            &policy(700),
            &quote(Price::from_units(450)),
            Some(Price::from_units(600)),
        );
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].is_digest());
        assert!(alerts[1].is_drop());
    }

    #[test]
    fn test_no_alert_in_common_case() {
        let alerts = DealClassifier::default().classify(
            &policy(700),
            &quote(Price::from_units(650)),
            Some(Price::from_units(660)),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_price_above_baseline_never_drops() {
        let alerts = DealClassifier::default().classify(
            &policy(700),
            &quote(Price::from_units(690)),
            Some(Price::from_units(600)),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let classifier = DealClassifier::default();
        // exactly 20% under ceiling and exactly 20% under baseline
        let alerts = classifier.classify(
            &policy(500),
            &quote(Price::from_units(400)),
            Some(Price::from_units(500)),
        );
        assert_eq!(alerts.len(), 2);

        // just short of 20%
        let alerts = classifier.classify(
            &policy(500),
            &quote(Price::from_cents(40001)),
            Some(Price::from_units(500)),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = DealClassifier::new(ClassifierConfig {
            min_savings_bps: 3000,
            min_drop_bps: 1000,
        });
        let alerts = classifier.classify(
            &policy(700),
            &quote(Price::from_units(500)),
            Some(Price::from_units(560)),
        );
        // 28.57% savings misses 30%; 10.7% drop clears 10%
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_drop());
    }

    #[test]
    fn test_classify_is_idempotent() {
        let classifier = DealClassifier::default();
        let p = policy(700);
        let q = quote(Price::from_units(450));
        let baseline = Some(Price::from_units(600));
        assert_eq!(
            classifier.classify(&p, &q, baseline),
            classifier.classify(&p, &q, baseline)
        );
    }

    #[test]
    fn test_no_alert_below_threshold_over_price_grid() {
        let classifier = DealClassifier::default();
        let p = policy(700);
        for price in (0..=700).step_by(7) {
            for baseline in [None, Some(Price::from_units(300)), Some(Price::from_units(900))] {
                for alert in classifier.classify(&p, &quote(Price::from_units(price)), baseline) {
                    match alert.kind {
                        AlertKind::Digest { savings_bps } => {
                            assert!(savings_bps >= DEFAULT_MIN_SAVINGS_BPS)
                        }
                        AlertKind::Drop { drop_bps, .. } => {
                            assert!(drop_bps >= DEFAULT_MIN_DROP_BPS)
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_ceiling_never_digests() {
        let alerts = DealClassifier::default().classify(
            &policy(0),
            &quote(Price::ZERO),
            None,
        );
        assert!(alerts.is_empty());
    }
}
