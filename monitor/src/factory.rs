use std::sync::Arc;

use adapters::QuoteSource;
use corelib::{AppConfig, ConfigurationError};
use engine::{AlertLogger, AlertManager, strategies_for};

use crate::service::{Monitor, MonitorSettings};

/// Validates `config` and wires a monitor for its default symbol: an alert
/// manager with the configured strategies and a logging subscriber.
pub fn build_monitor(
    config: &AppConfig,
    source: Arc<dyn QuoteSource>,
) -> Result<Arc<Monitor>, ConfigurationError> {
    config.validate()?;

    let alerts = Arc::new(AlertManager::new());
    alerts.add_observer(Arc::new(AlertLogger));

    for (name, strategy) in strategies_for(&config.alerts, &config.default_symbol) {
        alerts.add_strategy(name, strategy);
    }

    Monitor::new(MonitorSettings::from_config(config), source, alerts)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use corelib::{ApiError, PriceQuote};

    use super::*;
    use crate::service::MonitorState;

    struct NoSource;

    #[async_trait]
    impl QuoteSource for NoSource {
        async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
            Err(ApiError::NotFound {
                symbol: symbol.to_string(),
            })
        }
    }

    #[test]
    fn builds_idle_monitor_with_default_strategies() {
        let monitor = build_monitor(&AppConfig::default(), Arc::new(NoSource)).unwrap();

        assert_eq!(monitor.state(), MonitorState::Idle);
        assert_eq!(monitor.symbol(), "bitcoin");
        assert_eq!(
            monitor.alert_manager().strategy_names(),
            vec!["threshold", "variation"]
        );
        assert!(monitor.get_stats().is_none());
        assert_eq!(monitor.get_status().uptime, std::time::Duration::ZERO);
    }

    #[test]
    fn rejects_short_refresh_interval() {
        let config = AppConfig {
            refresh_interval_ms: 999,
            ..AppConfig::default()
        };

        let err = build_monitor(&config, Arc::new(NoSource)).err().unwrap();

        assert_eq!(
            err,
            ConfigurationError::RefreshIntervalTooShort {
                value_ms: 999,
                min_ms: 1_000
            }
        );
    }

    #[test]
    fn oversized_variation_window_is_a_configuration_error() {
        let mut config = AppConfig::default();
        if let Some(variation) = config.alerts.variation.as_mut() {
            variation.time_window_minutes = 1e18;
        }

        let err = build_monitor(&config, Arc::new(NoSource)).err().unwrap();

        assert!(matches!(err, ConfigurationError::InvalidValue { field, .. }
            if field == "alerts.variation.timeWindowMinutes"));
    }
}
