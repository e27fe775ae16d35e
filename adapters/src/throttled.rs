//! Client-side pacing and rate-limit retries around a raw [`PriceFeed`].

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, warn};

use corelib::{ApiError, PriceQuote};

use crate::source::{PriceFeed, QuoteSource};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(2_000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Minimum spacing between two upstream requests from this instance.
    pub min_interval: Duration,
    /// Retries after the first rate-limited response.
    pub max_retries: u32,
    /// Retry `n` (1-based) waits `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Wraps a feed with a minimum inter-request interval and linear backoff
/// on [`ApiError::RateLimited`].
///
/// Request slots are reserved under a short lock and awaited outside it,
/// so concurrent callers queue up one interval apart without holding the
/// lock across the sleep or the request.
pub struct ThrottledSource<F> {
    feed: F,
    policy: RetryPolicy,
    next_slot: Mutex<Option<Instant>>,
}

impl<F: PriceFeed> ThrottledSource<F> {
    pub fn new(feed: F) -> Self {
        Self::with_policy(feed, RetryPolicy::default())
    }

    pub fn with_policy(feed: F, policy: RetryPolicy) -> Self {
        Self {
            feed,
            policy,
            next_slot: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    async fn wait_for_slot(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.policy.min_interval);
            slot
        };

        if slot > Instant::now() {
            debug!(wait_ms = (slot - Instant::now()).as_millis() as u64, "pacing request");
            sleep_until(slot).await;
        }
    }
}

#[async_trait]
impl<F: PriceFeed> QuoteSource for ThrottledSource<F> {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
        let mut attempt = 0;

        loop {
            self.wait_for_slot().await;

            match self.feed.fetch_price(symbol).await {
                Err(ApiError::RateLimited { .. }) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        symbol = %symbol,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    sleep(delay).await;
                }
                Err(ApiError::RateLimited { .. }) => {
                    warn!(symbol = %symbol, retries = attempt, "rate limit retries exhausted");
                    return Err(ApiError::RateLimited {
                        symbol: symbol.to_string(),
                        retries: attempt,
                    });
                }
                other => return other,
            }
        }
    }
}
