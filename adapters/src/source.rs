use async_trait::async_trait;
use futures::future::try_join_all;

use corelib::{ApiError, PriceQuote};

/// One raw upstream request per call. No pacing, no retries.
///
/// Implementations map HTTP 429 (or the provider's equivalent) to
/// [`ApiError::RateLimited`] so [`crate::ThrottledSource`] can back off.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, ApiError>;
}

/// What the monitor polls: the latest quote for a symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ApiError>;

    /// One `get_price` per symbol. The first failure fails the whole batch.
    async fn get_prices(&self, symbols: &[String]) -> Result<Vec<PriceQuote>, ApiError> {
        try_join_all(symbols.iter().map(|symbol| self.get_price(symbol))).await
    }
}
