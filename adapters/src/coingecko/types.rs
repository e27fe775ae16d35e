use std::collections::HashMap;

use serde::Deserialize;

/// `/simple/price?ids=<id>&vs_currencies=usd` response, keyed by coin id.
pub type SimplePriceResponse = HashMap<String, CurrencyPrices>;

#[derive(Debug, Deserialize)]
pub struct CurrencyPrices {
    pub usd: Option<f64>,
}
