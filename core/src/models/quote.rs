use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::InvalidPrice;

/// One observed price for an asset at a point in time.
///
/// Fields are private so the positive/finite price invariant holds for
/// every constructed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    symbol: String,
    price: f64,
    observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, InvalidPrice> {
        if !price.is_finite() || price <= 0.0 {
            return Err(InvalidPrice(price));
        }

        Ok(Self {
            symbol: symbol.into(),
            price,
            observed_at,
        })
    }

    /// Quote observed right now.
    pub fn now(symbol: impl Into<String>, price: f64) -> Result<Self, InvalidPrice> {
        Self::new(symbol, price, Utc::now())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn format_price(&self, decimals: usize) -> String {
        format!("${:.*}", decimals, self.price)
    }

    /// Percentage change of this quote relative to `base`.
    pub fn variation_from(&self, base: &PriceQuote) -> f64 {
        percentage_change(base.price, self.price)
    }
}

/// `(current - base) / base * 100`, or 0 when `base` is 0.
pub fn percentage_change(base: f64, current: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    (current - base) / base * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_non_finite_prices() {
        assert_eq!(PriceQuote::now("btc", 0.0), Err(InvalidPrice(0.0)));
        assert_eq!(PriceQuote::now("btc", -1.0), Err(InvalidPrice(-1.0)));
        assert!(PriceQuote::now("btc", f64::NAN).is_err());
        assert!(PriceQuote::now("btc", f64::INFINITY).is_err());
        assert!(PriceQuote::now("btc", 0.0001).is_ok());
    }

    #[test]
    fn variation_is_relative_to_base() {
        let base = PriceQuote::now("btc", 200.0).unwrap();
        let up = PriceQuote::now("btc", 210.0).unwrap();
        let down = PriceQuote::now("btc", 150.0).unwrap();

        assert!((up.variation_from(&base) - 5.0).abs() < 1e-9);
        assert!((down.variation_from(&base) + 25.0).abs() < 1e-9);
        assert_eq!(percentage_change(0.0, 10.0), 0.0);
    }

    #[test]
    fn formats_with_requested_precision() {
        let q = PriceQuote::now("eth", 1234.5).unwrap();
        assert_eq!(q.format_price(2), "$1234.50");
        assert_eq!(q.format_price(6), "$1234.500000");
    }
}
