use std::sync::Arc;

use tracing::info;

use corelib::ConfigurationError;
use corelib::config::ApiConfig;

use crate::coingecko::CoinGeckoFeed;
use crate::source::QuoteSource;
use crate::throttled::ThrottledSource;

/// Builds the paced, retrying quote source for the configured provider.
pub fn create_quote_source(api: &ApiConfig) -> Result<Arc<dyn QuoteSource>, ConfigurationError> {
    match api.provider.trim().to_ascii_lowercase().as_str() {
        "coingecko" => {
            let feed = CoinGeckoFeed::new(api.base_url.clone(), api.api_key.clone())?;
            info!(provider = "coingecko", base_url = %api.base_url, "quote source ready");
            Ok(Arc::new(ThrottledSource::new(feed)))
        }
        "binance" | "coinbase" => Err(ConfigurationError::ProviderNotImplemented(
            api.provider.clone(),
        )),
        _ => Err(ConfigurationError::UnsupportedProvider(api.provider.clone())),
    }
}
