use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Polling faster than this gets throttled by every public quote API.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 1_000;

pub const DEFAULT_SYMBOL: &str = "bitcoin";
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_PROVIDER: &str = "coingecko";
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Symbol monitored right after startup (provider id, e.g. `bitcoin`).
    pub default_symbol: String,

    // =========================
    // Polling
    // =========================
    /// Delay between two price polls.
    ///
    /// Must be at least [`MIN_REFRESH_INTERVAL_MS`]; anything lower is
    /// rejected at startup instead of being silently clamped.
    pub refresh_interval_ms: u64,

    // =========================
    // Alerting
    // =========================
    /// Strategy tunables. A missing section disables that strategy.
    #[serde(default)]
    pub alerts: AlertsConfig,

    // =========================
    // Upstream
    // =========================
    pub api: ApiConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsConfig {
    pub threshold: Option<ThresholdConfig>,
    pub variation: Option<VariationConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    /// Thresholds are percentages off the first observed price.
    Dynamic,
    /// Thresholds are fixed prices per symbol.
    Static,
}

impl FromStr for ThresholdMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Self::Dynamic),
            "static" => Ok(Self::Static),
            other => Err(ConfigurationError::invalid(
                "alerts.threshold.mode",
                format!("expected dynamic or static, got {other}"),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub mode: ThresholdMode,

    /// Signed percentage applied to the first price, e.g. `-5.0`.
    pub buy_percentage: f64,

    /// Signed percentage applied to the first price, e.g. `5.0`.
    pub sell_percentage: f64,

    /// Used in static mode, keyed by symbol.
    #[serde(default)]
    pub static_prices: HashMap<String, StaticPrices>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticPrices {
    pub buy_price: f64,
    pub sell_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationConfig {
    /// Absolute percentage move that triggers an alert.
    pub percentage: f64,

    /// Trailing window used to pick the baseline quote.
    pub time_window_minutes: f64,
}

impl VariationConfig {
    /// Saturates at `Duration::MAX`; `AppConfig::validate` rejects such windows.
    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_window_minutes.max(0.0) * 60.0)
            .unwrap_or(Duration::MAX)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub provider: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_symbol: DEFAULT_SYMBOL.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            alerts: AlertsConfig {
                threshold: Some(ThresholdConfig {
                    mode: ThresholdMode::Dynamic,
                    buy_percentage: -5.0,
                    sell_percentage: 5.0,
                    static_prices: HashMap::new(),
                }),
                variation: Some(VariationConfig {
                    percentage: 5.0,
                    time_window_minutes: 15.0,
                }),
            },
            api: ApiConfig {
                provider: DEFAULT_PROVIDER.to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key: None,
            },
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with `MONITOR_*` environment variables, validated.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(symbol) = lookup("MONITOR_SYMBOL") {
            cfg.default_symbol = symbol;
        }
        if let Some(ms) = parse_var(&lookup, "MONITOR_REFRESH_MS")? {
            cfg.refresh_interval_ms = ms;
        }
        if let Some(provider) = lookup("MONITOR_API_PROVIDER") {
            cfg.api.provider = provider;
        }
        if let Some(url) = lookup("MONITOR_API_BASE_URL") {
            cfg.api.base_url = url;
        }
        cfg.api.api_key = lookup("MONITOR_API_KEY").filter(|k| !k.is_empty());

        if lookup("MONITOR_THRESHOLD_DISABLED").is_some() {
            cfg.alerts.threshold = None;
        }
        if let Some(threshold) = cfg.alerts.threshold.as_mut() {
            if let Some(mode) = parse_var(&lookup, "MONITOR_THRESHOLD_MODE")? {
                threshold.mode = mode;
            }
            if let Some(pct) = parse_var(&lookup, "MONITOR_BUY_PCT")? {
                threshold.buy_percentage = pct;
            }
            if let Some(pct) = parse_var(&lookup, "MONITOR_SELL_PCT")? {
                threshold.sell_percentage = pct;
            }
        }

        if lookup("MONITOR_VARIATION_DISABLED").is_some() {
            cfg.alerts.variation = None;
        }
        if let Some(variation) = cfg.alerts.variation.as_mut() {
            if let Some(pct) = parse_var(&lookup, "MONITOR_VARIATION_PCT")? {
                variation.percentage = pct;
            }
            if let Some(minutes) = parse_var(&lookup, "MONITOR_VARIATION_WINDOW_MIN")? {
                variation.time_window_minutes = minutes;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.default_symbol.trim().is_empty() {
            return Err(ConfigurationError::MissingField("defaultSymbol"));
        }

        if self.refresh_interval_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(ConfigurationError::RefreshIntervalTooShort {
                value_ms: self.refresh_interval_ms,
                min_ms: MIN_REFRESH_INTERVAL_MS,
            });
        }

        if self.api.provider.trim().is_empty() {
            return Err(ConfigurationError::MissingField("api.provider"));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigurationError::MissingField("api.baseUrl"));
        }

        if let Some(threshold) = &self.alerts.threshold {
            if !threshold.buy_percentage.is_finite() || !threshold.sell_percentage.is_finite() {
                return Err(ConfigurationError::invalid(
                    "alerts.threshold",
                    "percentages must be finite",
                ));
            }
            for (symbol, prices) in &threshold.static_prices {
                let valid = prices.buy_price.is_finite()
                    && prices.sell_price.is_finite()
                    && prices.buy_price > 0.0
                    && prices.buy_price < prices.sell_price;
                if !valid {
                    return Err(ConfigurationError::invalid(
                        format!("alerts.threshold.staticPrices.{symbol}"),
                        "buy and sell prices must be positive with buy < sell",
                    ));
                }
            }
        }

        if let Some(variation) = &self.alerts.variation {
            if !(variation.percentage.is_finite() && variation.percentage > 0.0) {
                return Err(ConfigurationError::invalid(
                    "alerts.variation.percentage",
                    "must be a positive number",
                ));
            }
            if !(variation.time_window_minutes.is_finite() && variation.time_window_minutes > 0.0)
            {
                return Err(ConfigurationError::invalid(
                    "alerts.variation.timeWindowMinutes",
                    "must be a positive number",
                ));
            }
            if Duration::try_from_secs_f64(variation.time_window_minutes * 60.0).is_err() {
                return Err(ConfigurationError::invalid(
                    "alerts.variation.timeWindowMinutes",
                    "window is too large",
                ));
            }
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigurationError::invalid(key, format!("cannot parse {raw:?}"))),
    }
}
