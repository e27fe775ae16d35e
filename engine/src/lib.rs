pub mod history;
pub mod loggers;
pub mod manager;
pub mod observer;
pub mod strategy;

pub use history::{HISTORY_CAPACITY, PriceHistory, PriceSummary};
pub use loggers::{AlertFileLogger, AlertLogger};
pub use manager::{AlertManager, AlertStats};
pub use observer::{ChannelObserver, Observer, ObserverSet, notify_all};
pub use strategy::{
    AlertStrategy, CustomStrategy, ThresholdStrategy, VariationStrategy, strategies_for,
};
