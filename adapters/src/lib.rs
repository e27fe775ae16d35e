pub mod coingecko;
pub mod factory;
pub mod source;
pub mod throttled;

pub use coingecko::CoinGeckoFeed;
pub use factory::create_quote_source;
pub use source::{PriceFeed, QuoteSource};
pub use throttled::{RetryPolicy, ThrottledSource};
