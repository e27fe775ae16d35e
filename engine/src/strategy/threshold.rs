//! Buy/sell zone crossing.
//!
//! Thresholds are fixed lazily from the first quote seen. An alert fires only
//! when the price *enters* the buy or sell zone; staying inside a zone or
//! returning to neutral is silent.

use tracing::info;

use corelib::config::{ThresholdConfig, ThresholdMode};
use corelib::{Alert, AlertKind, PriceQuote, StrategyError};

/// Used in static mode when no prices are configured for the symbol.
const FALLBACK_BUY_FACTOR: f64 = 0.95;
const FALLBACK_SELL_FACTOR: f64 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Neutral,
    BelowBuy,
    AboveSell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub buy: f64,
    pub sell: f64,
}

impl Thresholds {
    /// Buy is checked first, so a price that satisfies both is `BelowBuy`.
    pub fn classify(&self, price: f64) -> Zone {
        if price <= self.buy {
            Zone::BelowBuy
        } else if price >= self.sell {
            Zone::AboveSell
        } else {
            Zone::Neutral
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdStrategy {
    config: ThresholdConfig,
    symbol: String,
    zone: Zone,
    thresholds: Option<Thresholds>,
}

impl ThresholdStrategy {
    pub fn new(config: ThresholdConfig, symbol: impl Into<String>) -> Self {
        Self {
            config,
            symbol: symbol.into(),
            zone: Zone::Neutral,
            thresholds: None,
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// `None` until the first quote has been checked.
    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    pub fn is_initialized(&self) -> bool {
        self.thresholds.is_some()
    }

    pub fn check(&mut self, quote: &PriceQuote) -> Result<Option<Alert>, StrategyError> {
        let thresholds = self.ensure_thresholds(quote.price())?;

        let previous = self.zone;
        self.zone = thresholds.classify(quote.price());

        if self.zone == previous {
            return Ok(None);
        }

        Ok(self.alert_for(quote, thresholds))
    }

    fn ensure_thresholds(&mut self, first_price: f64) -> Result<Thresholds, StrategyError> {
        if let Some(t) = self.thresholds {
            return Ok(t);
        }

        let t = self.compute_thresholds(first_price);
        if !t.buy.is_finite() || !t.sell.is_finite() {
            return Err(StrategyError::NonFinite { what: "threshold" });
        }

        info!(
            symbol = %self.symbol,
            buy = t.buy,
            sell = t.sell,
            "thresholds configured"
        );

        self.thresholds = Some(t);
        Ok(t)
    }

    fn compute_thresholds(&self, price: f64) -> Thresholds {
        let dynamic = |buy_pct: f64, sell_pct: f64| Thresholds {
            buy: price * (1.0 + buy_pct / 100.0),
            sell: price * (1.0 + sell_pct / 100.0),
        };

        match self.config.mode {
            ThresholdMode::Dynamic => {
                dynamic(self.config.buy_percentage, self.config.sell_percentage)
            }
            ThresholdMode::Static => match self.config.static_prices.get(&self.symbol) {
                Some(fixed) => Thresholds {
                    buy: fixed.buy_price,
                    sell: fixed.sell_price,
                },
                None => Thresholds {
                    buy: price * FALLBACK_BUY_FACTOR,
                    sell: price * FALLBACK_SELL_FACTOR,
                },
            },
        }
    }

    fn alert_for(&self, quote: &PriceQuote, t: Thresholds) -> Option<Alert> {
        let symbol = quote.symbol().to_uppercase();
        let (kind, message) = match self.zone {
            Zone::BelowBuy => (
                AlertKind::Buy,
                format!(
                    "BUY OPPORTUNITY! {symbol} dropped to {} (below ${:.6})",
                    quote.format_price(6),
                    t.buy
                ),
            ),
            Zone::AboveSell => (
                AlertKind::Sell,
                format!(
                    "SELL OPPORTUNITY! {symbol} rose to {} (above ${:.6})",
                    quote.format_price(6),
                    t.sell
                ),
            ),
            Zone::Neutral => return None,
        };

        Some(Alert::new(
            kind,
            message,
            quote.price(),
            quote.symbol(),
            quote.observed_at(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{DateTime, TimeDelta, Utc};
    use corelib::config::StaticPrices;

    use super::*;

    fn dynamic(buy: f64, sell: f64) -> ThresholdConfig {
        ThresholdConfig {
            mode: ThresholdMode::Dynamic,
            buy_percentage: buy,
            sell_percentage: sell,
            static_prices: HashMap::new(),
        }
    }

    fn quote(price: f64, secs: i64) -> PriceQuote {
        let t0 = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        PriceQuote::new("bitcoin", price, t0 + TimeDelta::seconds(secs)).unwrap()
    }

    fn kinds(strategy: &mut ThresholdStrategy, prices: &[f64]) -> Vec<Option<AlertKind>> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                strategy
                    .check(&quote(*p, i as i64))
                    .unwrap()
                    .map(|a| a.kind)
            })
            .collect()
    }

    #[test]
    fn buy_then_sell_scenario() {
        let mut s = ThresholdStrategy::new(dynamic(-5.0, 5.0), "bitcoin");

        assert_eq!(s.check(&quote(100.0, 0)).unwrap(), None);
        let t = s.thresholds().unwrap();
        assert!((t.buy - 95.0).abs() < 1e-9);
        assert!((t.sell - 105.0).abs() < 1e-9);

        let buy = s.check(&quote(94.0, 1)).unwrap().unwrap();
        assert_eq!(buy.kind, AlertKind::Buy);
        assert_eq!(buy.price, 94.0);
        assert!(buy.message.contains("BITCOIN"));

        assert_eq!(s.check(&quote(93.0, 2)).unwrap(), None);

        let sell = s.check(&quote(106.0, 3)).unwrap().unwrap();
        assert_eq!(sell.kind, AlertKind::Sell);
        assert_eq!(s.zone(), Zone::AboveSell);
    }

    #[test]
    fn returning_to_neutral_is_silent_and_rearms() {
        let mut s = ThresholdStrategy::new(dynamic(-5.0, 5.0), "bitcoin");

        let fired = kinds(&mut s, &[100.0, 90.0, 100.0, 90.0]);

        assert_eq!(
            fired,
            vec![None, Some(AlertKind::Buy), None, Some(AlertKind::Buy)]
        );
    }

    #[test]
    fn thresholds_never_move_after_first_quote() {
        let mut s = ThresholdStrategy::new(dynamic(-5.0, 5.0), "bitcoin");
        s.check(&quote(100.0, 0)).unwrap();
        let first = s.thresholds();

        s.check(&quote(500.0, 1)).unwrap();
        s.check(&quote(1.0, 2)).unwrap();

        assert_eq!(s.thresholds(), first);
    }

    #[test]
    fn first_quote_can_fire_when_already_in_a_zone() {
        let mut fixed = HashMap::new();
        fixed.insert(
            "bitcoin".to_string(),
            StaticPrices {
                buy_price: 50_000.0,
                sell_price: 70_000.0,
            },
        );
        let cfg = ThresholdConfig {
            mode: ThresholdMode::Static,
            buy_percentage: 0.0,
            sell_percentage: 0.0,
            static_prices: fixed,
        };
        let mut s = ThresholdStrategy::new(cfg, "bitcoin");

        let alert = s.check(&quote(45_000.0, 0)).unwrap().unwrap();

        assert_eq!(alert.kind, AlertKind::Buy);
        assert_eq!(
            s.thresholds(),
            Some(Thresholds {
                buy: 50_000.0,
                sell: 70_000.0
            })
        );
    }

    #[test]
    fn static_mode_without_prices_falls_back_to_five_percent() {
        let cfg = ThresholdConfig {
            mode: ThresholdMode::Static,
            buy_percentage: -20.0,
            sell_percentage: 20.0,
            static_prices: HashMap::new(),
        };
        let mut s = ThresholdStrategy::new(cfg, "dogecoin");

        s.check(&quote(200.0, 0)).unwrap();

        let t = s.thresholds().unwrap();
        assert!((t.buy - 190.0).abs() < 1e-9);
        assert!((t.sell - 210.0).abs() < 1e-9);
    }

    #[test]
    fn overlapping_thresholds_prefer_buy() {
        let t = Thresholds {
            buy: 100.0,
            sell: 90.0,
        };
        assert_eq!(t.classify(95.0), Zone::BelowBuy);
        assert_eq!(t.classify(101.0), Zone::AboveSell);
    }

    #[test]
    fn non_finite_thresholds_are_an_error() {
        let mut s = ThresholdStrategy::new(dynamic(f64::INFINITY, 5.0), "bitcoin");

        assert_eq!(
            s.check(&quote(100.0, 0)),
            Err(StrategyError::NonFinite { what: "threshold" })
        );
        assert!(!s.is_initialized());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fires_iff_zone_changes_into_buy_or_sell(
                first in 10.0..1_000.0f64,
                moves in prop::collection::vec(0.5..1.5f64, 1..60),
            ) {
                let mut s = ThresholdStrategy::new(dynamic(-5.0, 5.0), "bitcoin");
                s.check(&quote(first, 0)).unwrap();
                let t = s.thresholds().unwrap();

                let mut zone = s.zone();
                for (i, m) in moves.iter().enumerate() {
                    let price = first * m;
                    let alert = s.check(&quote(price, i as i64 + 1)).unwrap();
                    let next = t.classify(price);

                    let expected = match next {
                        Zone::BelowBuy if zone != next => Some(AlertKind::Buy),
                        Zone::AboveSell if zone != next => Some(AlertKind::Sell),
                        _ => None,
                    };
                    prop_assert_eq!(alert.map(|a| a.kind), expected);
                    zone = next;
                }
            }
        }
    }
}
