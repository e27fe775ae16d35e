use std::time::Duration;

use chrono::{DateTime, Utc};

use super::alert::Alert;
use crate::error::ApiError;

/// Published for every successful poll, whether or not an alert fired.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Price of the second-to-last history entry; `None` on the first sample.
    pub previous_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    Started {
        symbol: String,
        interval: Duration,
    },
    Stopped {
        uptime: Duration,
        total_checks: u64,
        errors: u64,
    },
    Error {
        error: ApiError,
        symbol: String,
    },
    CoinChanged {
        from: String,
        to: String,
    },
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Started { .. } => "started",
            Lifecycle::Stopped { .. } => "stopped",
            Lifecycle::Error { .. } => "error",
            Lifecycle::CoinChanged { .. } => "coin_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub kind: Lifecycle,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn now(kind: Lifecycle) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Everything a monitor publishes to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    PriceUpdate(PriceUpdate),
    Lifecycle(LifecycleEvent),
}

/// Published by the alert manager for every fired alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub alert: Alert,
    pub triggered_at: DateTime<Utc>,
}
