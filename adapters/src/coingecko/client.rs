use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use corelib::{ApiError, ConfigurationError, PriceQuote};

use crate::coingecko::types::SimplePriceResponse;
use crate::source::PriceFeed;

/// Raw CoinGecko `simple/price` client. Wrap it in
/// [`crate::ThrottledSource`] before polling.
#[derive(Clone)]
pub struct CoinGeckoFeed {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoFeed {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, ConfigurationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn query<'a>(&'a self, symbol: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut query = vec![("ids", symbol), ("vs_currencies", "usd")];
        if let Some(key) = &self.api_key {
            query.push(("x_cg_demo_api_key", key.as_str()));
        }
        query
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    #[instrument(skip(self), fields(symbol = %symbol), level = "debug")]
    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
        let url = format!("{}/simple/price", self.base_url);

        let resp = self
            .http
            .get(&url)
            .query(&self.query(symbol))
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                symbol: symbol.to_string(),
                retries: 0,
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Transport {
                status: Some(status.as_u16()),
                body,
            });
        }

        let data: SimplePriceResponse = resp.json().await.map_err(|e| ApiError::Transport {
            status: Some(status.as_u16()),
            body: format!("malformed response: {e}"),
        })?;

        let price = data
            .get(symbol)
            .and_then(|prices| prices.usd)
            .filter(|usd| *usd != 0.0)
            .ok_or_else(|| ApiError::NotFound {
                symbol: symbol.to_string(),
            })?;

        debug!(price, "coingecko price fetched");

        PriceQuote::new(symbol, price, Utc::now()).map_err(|e| ApiError::Transport {
            status: Some(status.as_u16()),
            body: e.to_string(),
        })
    }
}
