use std::collections::VecDeque;

use corelib::PriceQuote;

/// Maximum number of quotes retained per monitored symbol.
pub const HISTORY_CAPACITY: usize = 100;

/// Bounded, time-ordered quote buffer with FIFO eviction.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    window: VecDeque<PriceQuote>,
    capacity: usize,
}

/// Min/max/current over the retained window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSummary {
    pub current: f64,
    pub max: f64,
    pub min: f64,
    pub samples: usize,
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `quote`, evicting the oldest entry when full.
    ///
    /// Returns `false` (and stores nothing) if `quote` is older than the
    /// latest retained entry.
    pub fn push(&mut self, quote: PriceQuote) -> bool {
        if let Some(last) = self.window.back() {
            if quote.observed_at() < last.observed_at() {
                return false;
            }
        }

        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(quote);
        true
    }

    pub fn latest(&self) -> Option<&PriceQuote> {
        self.window.back()
    }

    /// Second-to-last entry.
    pub fn previous(&self) -> Option<&PriceQuote> {
        let len = self.window.len();
        if len < 2 {
            return None;
        }
        self.window.get(len - 2)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PriceQuote> {
        self.window.iter()
    }

    pub fn to_vec(&self) -> Vec<PriceQuote> {
        self.window.iter().cloned().collect()
    }

    pub fn summary(&self) -> Option<PriceSummary> {
        let current = self.window.back()?.price();
        let (min, max) = self
            .window
            .iter()
            .map(PriceQuote::price)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p), hi.max(p))
            });

        Some(PriceSummary {
            current,
            max,
            min,
            samples: self.window.len(),
        })
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
