use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::AlertEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Buy,
    Sell,
    Variation,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertKind::Buy => "BUY",
            AlertKind::Sell => "SELL",
            AlertKind::Variation => "VARIATION",
        };
        f.write_str(s)
    }
}

/// An alert fired by a strategy. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub price: f64,
    pub symbol: String,
    pub fired_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        message: impl Into<String>,
        price: f64,
        symbol: impl Into<String>,
        fired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            price,
            symbol: symbol.into(),
            fired_at,
        }
    }

    /// `[HH:MM:SS] KIND: message`
    pub fn format(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.fired_at.format("%H:%M:%S"),
            self.kind,
            self.message
        )
    }

    pub fn to_event(&self) -> AlertEvent {
        AlertEvent {
            alert: self.clone(),
            triggered_at: self.fired_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_prefixes_time_and_kind() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap();
        let alert = Alert::new(AlertKind::Sell, "sell now", 106.0, "bitcoin", at);

        assert_eq!(alert.format(), "[13:04:05] SELL: sell now");
        assert_eq!(alert.to_event().triggered_at, at);
        assert_eq!(alert.to_event().alert, alert);
    }

    #[test]
    fn kinds_serialize_upper_case() {
        let json = serde_json::to_string(&AlertKind::Variation).unwrap();
        assert_eq!(json, "\"VARIATION\"");
    }
}
