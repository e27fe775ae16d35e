use tracing::{debug, info};

use corelib::{Lifecycle, MonitorEvent, ObserverError};
use engine::Observer;

/// Mirrors monitor events to the tracing output. Price updates go to debug.
#[derive(Debug, Default)]
pub struct MonitorEventLogger;

impl Observer<MonitorEvent> for MonitorEventLogger {
    fn update(&self, event: &MonitorEvent) -> Result<(), ObserverError> {
        match event {
            MonitorEvent::PriceUpdate(update) => debug!(
                symbol = %update.symbol,
                price = update.price,
                previous = ?update.previous_price,
                "price update"
            ),
            MonitorEvent::Lifecycle(event) => match &event.kind {
                Lifecycle::Started { symbol, interval } => info!(
                    symbol = %symbol,
                    interval_ms = interval.as_millis() as u64,
                    "monitor event: started"
                ),
                Lifecycle::Stopped {
                    uptime,
                    total_checks,
                    errors,
                } => info!(
                    uptime_ms = uptime.as_millis() as u64,
                    total_checks,
                    errors,
                    "monitor event: stopped"
                ),
                Lifecycle::Error { error, symbol } => info!(
                    symbol = %symbol,
                    error = %error,
                    "monitor event: error"
                ),
                Lifecycle::CoinChanged { from, to } => info!(
                    from = %from,
                    to = %to,
                    "monitor event: coin_changed"
                ),
            },
        }
        Ok(())
    }
}
