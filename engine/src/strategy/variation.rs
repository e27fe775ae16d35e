//! Windowed percentage variation.
//!
//! Compares the current price against the most recent quote that is at
//! least `window` old (or the oldest retained quote). Re-firing requires the
//! cool-down to elapse *and* a strictly larger magnitude than the previous
//! alert, for the lifetime of the instance.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use corelib::config::VariationConfig;
use corelib::{Alert, AlertKind, PriceQuote, StrategyError};

/// Minimum time between two alerts from the same instance.
pub const VARIATION_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct VariationStrategy {
    percentage: f64,
    window: TimeDelta,
    window_minutes: f64,
    last_alert_at: Option<DateTime<Utc>>,
    last_alert_magnitude: f64,
}

impl VariationStrategy {
    pub fn new(config: &VariationConfig) -> Self {
        Self {
            percentage: config.percentage,
            window: to_time_delta(config.window()),
            window_minutes: config.time_window_minutes,
            last_alert_at: None,
            last_alert_magnitude: 0.0,
        }
    }

    pub fn last_alert_at(&self) -> Option<DateTime<Utc>> {
        self.last_alert_at
    }

    pub fn last_alert_magnitude(&self) -> f64 {
        self.last_alert_magnitude
    }

    /// `now` is the quote's observation time.
    pub fn check(
        &mut self,
        quote: &PriceQuote,
        history: &[PriceQuote],
    ) -> Result<Option<Alert>, StrategyError> {
        if history.len() < 2 {
            return Ok(None);
        }

        let now = quote.observed_at();
        let Some(base) = self.base_quote(now, history) else {
            return Ok(None);
        };

        let variation = quote.variation_from(base);
        if !variation.is_finite() {
            return Err(StrategyError::NonFinite { what: "variation" });
        }
        let magnitude = variation.abs();

        if !self.should_alert(magnitude, now) {
            return Ok(None);
        }

        self.last_alert_at = Some(now);
        self.last_alert_magnitude = magnitude;

        let direction = if variation > 0.0 { "rose" } else { "fell" };
        let message = format!(
            "SIGNIFICANT VARIATION! {} {direction} {magnitude:.2}% in the last {} minutes",
            quote.symbol().to_uppercase(),
            self.window_minutes
        );

        Ok(Some(Alert::new(
            AlertKind::Variation,
            message,
            quote.price(),
            quote.symbol(),
            now,
        )))
    }

    /// Most recent entry at or before `now - window`, else the oldest entry.
    fn base_quote<'a>(&self, now: DateTime<Utc>, history: &'a [PriceQuote]) -> Option<&'a PriceQuote> {
        let cutoff = now.checked_sub_signed(self.window);

        cutoff
            .and_then(|cutoff| history.iter().rev().find(|q| q.observed_at() <= cutoff))
            .or_else(|| history.first())
    }

    fn should_alert(&self, magnitude: f64, now: DateTime<Utc>) -> bool {
        if magnitude < self.percentage {
            return false;
        }

        if let Some(last) = self.last_alert_at {
            if now - last < to_time_delta(VARIATION_COOLDOWN) {
                return false;
            }
        }

        magnitude > self.last_alert_magnitude
    }
}

fn to_time_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}
