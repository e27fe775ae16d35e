//! Alert strategies.
//!
//! A strategy inspects the current quote plus the retained history and may
//! emit one [`Alert`]. It only ever mutates its own state. Expected
//! conditions (not enough history, thresholds not yet known) yield `Ok(None)`;
//! `Err` is reserved for genuinely broken evaluations.

pub mod threshold;
pub mod variation;

pub use threshold::{ThresholdStrategy, Thresholds, Zone};
pub use variation::{VARIATION_COOLDOWN, VariationStrategy};

use corelib::config::AlertsConfig;
use corelib::{Alert, PriceQuote, StrategyError};

pub const THRESHOLD: &str = "threshold";
pub const VARIATION: &str = "variation";

/// Caller-supplied rule, for alerts the built-in strategies do not cover.
pub trait CustomStrategy: Send {
    fn check(
        &mut self,
        quote: &PriceQuote,
        history: &[PriceQuote],
    ) -> Result<Option<Alert>, StrategyError>;
}

pub enum AlertStrategy {
    Threshold(ThresholdStrategy),
    Variation(VariationStrategy),
    Custom(Box<dyn CustomStrategy>),
}

impl AlertStrategy {
    pub fn check(
        &mut self,
        quote: &PriceQuote,
        history: &[PriceQuote],
    ) -> Result<Option<Alert>, StrategyError> {
        match self {
            AlertStrategy::Threshold(s) => s.check(quote),
            AlertStrategy::Variation(s) => s.check(quote, history),
            AlertStrategy::Custom(s) => s.check(quote, history),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AlertStrategy::Threshold(_) => THRESHOLD,
            AlertStrategy::Variation(_) => VARIATION,
            AlertStrategy::Custom(_) => "custom",
        }
    }

    pub fn as_threshold(&self) -> Option<&ThresholdStrategy> {
        match self {
            AlertStrategy::Threshold(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_variation(&self) -> Option<&VariationStrategy> {
        match self {
            AlertStrategy::Variation(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AlertStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStrategy::Threshold(s) => f.debug_tuple("Threshold").field(s).finish(),
            AlertStrategy::Variation(s) => f.debug_tuple("Variation").field(s).finish(),
            AlertStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Fresh strategies for `symbol`, threshold first. Sections missing from
/// the config are skipped.
pub fn strategies_for(config: &AlertsConfig, symbol: &str) -> Vec<(String, AlertStrategy)> {
    let mut strategies = vec![];

    if let Some(threshold) = &config.threshold {
        strategies.push((
            THRESHOLD.to_string(),
            AlertStrategy::Threshold(ThresholdStrategy::new(threshold.clone(), symbol)),
        ));
    }

    if let Some(variation) = &config.variation {
        strategies.push((
            VARIATION.to_string(),
            AlertStrategy::Variation(VariationStrategy::new(variation)),
        ));
    }

    strategies
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use corelib::config::{ThresholdConfig, ThresholdMode, VariationConfig};

    use super::*;

    #[test]
    fn builds_configured_strategies_in_order() {
        let config = AlertsConfig {
            threshold: Some(ThresholdConfig {
                mode: ThresholdMode::Dynamic,
                buy_percentage: -5.0,
                sell_percentage: 5.0,
                static_prices: HashMap::new(),
            }),
            variation: Some(VariationConfig {
                percentage: 3.0,
                time_window_minutes: 10.0,
            }),
        };

        let built = strategies_for(&config, "bitcoin");
        let names: Vec<&str> = built.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(names, vec![THRESHOLD, VARIATION]);
        assert!(!built[0].1.as_threshold().unwrap().is_initialized());
        assert!(built[1].1.as_variation().is_some());
    }

    #[test]
    fn missing_sections_are_skipped() {
        assert!(strategies_for(&AlertsConfig::default(), "bitcoin").is_empty());
    }
}
