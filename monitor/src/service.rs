//! Price monitor state machine.
//!
//! ```text
//! IDLE --start--> RUNNING --poll failure--> ERROR --recovery delay--> RUNNING
//!   \                 \                        \
//!    `----------------`------------------------`--stop--> STOPPED
//! ```
//!
//! One poll task and one heartbeat task per run. Every run gets a fresh
//! `run_id`; a poll result that comes back after `stop()` (or after a
//! restart) sees a different id and is dropped without touching state.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, info, warn};

use adapters::QuoteSource;
use corelib::config::{AlertsConfig, MIN_REFRESH_INTERVAL_MS};
use corelib::{
    ApiError, AppConfig, ConfigurationError, Lifecycle, LifecycleEvent, MonitorEvent, PriceQuote,
    PriceUpdate,
};
use engine::{AlertManager, Observer, ObserverSet, PriceHistory, notify_all, strategies_for};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECOVERY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Error,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorState::Idle => "IDLE",
            MonitorState::Running => "RUNNING",
            MonitorState::Error => "ERROR",
            MonitorState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub symbol: String,
    pub interval: Duration,
    pub heartbeat_interval: Duration,
    pub recovery_delay: Duration,
    /// Used to rebuild strategies on symbol change.
    pub alerts: AlertsConfig,
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            symbol: config.default_symbol.clone(),
            interval: config.refresh_interval(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            recovery_delay: DEFAULT_RECOVERY_DELAY,
            alerts: config.alerts.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        if interval_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(ConfigurationError::RefreshIntervalTooShort {
                value_ms: interval_ms,
                min_ms: MIN_REFRESH_INTERVAL_MS,
            });
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigurationError::invalid("heartbeatInterval", "must be non-zero"));
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigurationError::MissingField("defaultSymbol"));
        }
        Ok(())
    }
}

/// Counters for the current run. Reset by `start()`; `last_error` survives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub started_at: Option<DateTime<Utc>>,
    pub total_checks: u64,
    pub errors_count: u64,
    pub last_error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub symbol: String,
    pub interval: Duration,
    /// Zero if never started.
    pub uptime: Duration,
    pub stats: RunStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStats {
    pub symbol: String,
    pub current: f64,
    pub max: f64,
    pub min: f64,
    pub samples: usize,
}

struct MonitorInner {
    state: MonitorState,
    symbol: String,
    history: PriceHistory,
    stats: RunStats,
    started: Option<Instant>,
    first_check: bool,
    checks_without_alert: u64,
    run_id: u64,
    tasks: Vec<JoinHandle<()>>,
    recovery: Option<JoinHandle<()>>,
}

impl MonitorInner {
    fn set_state(&mut self, next: MonitorState) {
        if self.state != next {
            info!(from = %self.state, to = %next, symbol = %self.symbol, "monitor state changed");
            self.state = next;
        }
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(recovery) = self.recovery.take() {
            recovery.abort();
        }
    }

    fn uptime(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }
}

pub struct Monitor {
    source: Arc<dyn QuoteSource>,
    alerts: Arc<AlertManager>,
    settings: MonitorSettings,
    inner: Mutex<MonitorInner>,
    observers: Mutex<ObserverSet<MonitorEvent>>,
}

impl Monitor {
    pub fn new(
        settings: MonitorSettings,
        source: Arc<dyn QuoteSource>,
        alerts: Arc<AlertManager>,
    ) -> Result<Arc<Self>, ConfigurationError> {
        settings.validate()?;

        let inner = MonitorInner {
            state: MonitorState::Idle,
            symbol: settings.symbol.clone(),
            history: PriceHistory::new(),
            stats: RunStats::default(),
            started: None,
            first_check: true,
            checks_without_alert: 0,
            run_id: 0,
            tasks: vec![],
            recovery: None,
        };

        Ok(Arc::new(Self {
            source,
            alerts,
            settings,
            inner: Mutex::new(inner),
            observers: Mutex::new(ObserverSet::new()),
        }))
    }

    pub fn state(&self) -> MonitorState {
        self.inner.lock().state
    }

    pub fn symbol(&self) -> String {
        self.inner.lock().symbol.clone()
    }

    pub fn alert_manager(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    pub fn checks_without_alert(&self) -> u64 {
        self.inner.lock().checks_without_alert
    }

    /// Polls once right away, then every `interval` until stopped.
    pub async fn start(self: &Arc<Self>) {
        let (run_id, symbol) = {
            let mut inner = self.inner.lock();
            if inner.state == MonitorState::Running {
                info!(symbol = %inner.symbol, "monitor already running");
                return;
            }

            inner.abort_tasks();
            inner.set_state(MonitorState::Running);
            inner.stats.started_at = Some(Utc::now());
            inner.stats.total_checks = 0;
            inner.stats.errors_count = 0;
            inner.started = Some(Instant::now());
            inner.run_id += 1;
            (inner.run_id, inner.symbol.clone())
        };

        info!(symbol = %symbol, interval_ms = self.settings.interval.as_millis() as u64, "starting monitor");

        self.poll_once(run_id).await;

        {
            let mut inner = self.inner.lock();
            if inner.run_id != run_id {
                debug!(symbol = %symbol, "monitor stopped during first poll");
                return;
            }
            let poller = tokio::spawn(poll_loop(Arc::downgrade(self), run_id, self.settings.interval));
            let heartbeat = tokio::spawn(heartbeat_loop(
                Arc::downgrade(self),
                run_id,
                self.settings.heartbeat_interval,
            ));
            inner.tasks.push(poller);
            inner.tasks.push(heartbeat);
        }

        self.notify_observers(&MonitorEvent::Lifecycle(LifecycleEvent::now(
            Lifecycle::Started {
                symbol,
                interval: self.settings.interval,
            },
        )));
    }

    /// Cancels polling, heartbeat and any pending recovery.
    pub fn stop(&self) {
        let stopped = {
            let mut inner = self.inner.lock();
            if inner.state == MonitorState::Stopped {
                info!(symbol = %inner.symbol, "monitor already stopped");
                return;
            }

            inner.set_state(MonitorState::Stopped);
            inner.run_id += 1;
            inner.abort_tasks();

            Lifecycle::Stopped {
                uptime: inner.uptime(),
                total_checks: inner.stats.total_checks,
                errors: inner.stats.errors_count,
            }
        };

        info!(event = ?stopped, "monitor stopped");
        self.notify_observers(&MonitorEvent::Lifecycle(LifecycleEvent::now(stopped)));
    }

    /// Switches to `symbol` with empty history and fresh strategy state.
    /// Strategies are rebuilt before the new symbol becomes visible to polls.
    pub fn change_symbol(&self, symbol: impl Into<String>) {
        let to = symbol.into();
        let from = {
            let mut inner = self.inner.lock();
            self.alerts
                .replace_strategies(strategies_for(&self.settings.alerts, &to));
            let from = std::mem::replace(&mut inner.symbol, to.clone());
            inner.history.clear();
            inner.checks_without_alert = 0;
            inner.first_check = true;
            from
        };

        info!(
            from = %from.to_uppercase(),
            to = %to.to_uppercase(),
            "monitored symbol changed"
        );
        self.notify_observers(&MonitorEvent::Lifecycle(LifecycleEvent::now(
            Lifecycle::CoinChanged { from, to },
        )));
    }

    /// `None` until the first successful poll of the current symbol.
    pub fn get_stats(&self) -> Option<MonitorStats> {
        let inner = self.inner.lock();
        let summary = inner.history.summary()?;

        Some(MonitorStats {
            symbol: inner.symbol.clone(),
            current: summary.current,
            max: summary.max,
            min: summary.min,
            samples: summary.samples,
        })
    }

    pub fn get_status(&self) -> MonitorStatus {
        let inner = self.inner.lock();

        MonitorStatus {
            state: inner.state,
            symbol: inner.symbol.clone(),
            interval: self.settings.interval,
            uptime: inner.uptime(),
            stats: inner.stats.clone(),
        }
    }

    pub fn history(&self) -> Vec<PriceQuote> {
        self.inner.lock().history.to_vec()
    }

    /// Returns `false` if the observer was already registered.
    pub fn add_observer(&self, observer: Arc<dyn Observer<MonitorEvent>>) -> bool {
        self.observers.lock().add(observer)
    }

    pub fn remove_observer(&self, observer: &Arc<dyn Observer<MonitorEvent>>) -> bool {
        self.observers.lock().remove(observer)
    }

    pub fn notify_observers(&self, event: &MonitorEvent) {
        let observers = self.observers.lock().snapshot();
        notify_all(&observers, event);
    }

    async fn poll_once(self: &Arc<Self>, run_id: u64) {
        let symbol = {
            let mut inner = self.inner.lock();
            if inner.run_id != run_id {
                return;
            }
            inner.stats.total_checks += 1;
            inner.symbol.clone()
        };

        match self.source.get_price(&symbol).await {
            Ok(quote) => self.on_quote(run_id, &symbol, quote),
            Err(error) => self.on_poll_error(run_id, &symbol, error),
        }
    }

    /// Symbol check, history append and strategy evaluation happen under one
    /// lock so `change_symbol` cannot interleave with them.
    fn on_quote(&self, run_id: u64, symbol: &str, quote: PriceQuote) {
        let (fired, previous_price) = {
            let mut inner = self.inner.lock();
            if inner.run_id != run_id || inner.symbol != symbol {
                debug!(symbol = %symbol, "discarding stale poll result");
                return;
            }
            if !inner.history.push(quote.clone()) {
                warn!(
                    symbol = %symbol,
                    observed_at = %quote.observed_at(),
                    "out-of-order quote rejected"
                );
                return;
            }
            let previous_price = inner.history.previous().map(|q| q.price());
            let fired = self.alerts.evaluate(&quote, &inner.history.to_vec());

            if inner.first_check || !fired.is_empty() {
                info!(
                    symbol = %symbol.to_uppercase(),
                    price = %quote.format_price(6),
                    alerts = fired.len(),
                    "price checked"
                );
                inner.first_check = false;
            }
            if fired.is_empty() {
                inner.checks_without_alert += 1;
            } else {
                inner.checks_without_alert = 0;
            }
            (fired, previous_price)
        };

        self.alerts.publish(&fired);

        self.notify_observers(&MonitorEvent::PriceUpdate(PriceUpdate {
            symbol: quote.symbol().to_string(),
            price: quote.price(),
            timestamp: quote.observed_at(),
            previous_price,
        }));
    }

    fn on_poll_error(self: &Arc<Self>, run_id: u64, symbol: &str, error: ApiError) {
        let entered_error = {
            let mut inner = self.inner.lock();
            if inner.run_id != run_id {
                debug!(symbol = %symbol, error = %error, "discarding stale poll failure");
                return;
            }

            inner.stats.errors_count += 1;
            inner.stats.last_error = Some(error.clone());

            if inner.state == MonitorState::Running {
                inner.set_state(MonitorState::Error);
                let recovery = tokio::spawn(recover_after(
                    Arc::downgrade(self),
                    run_id,
                    self.settings.recovery_delay,
                ));
                if let Some(previous) = inner.recovery.replace(recovery) {
                    previous.abort();
                }
                true
            } else {
                false
            }
        };

        if !entered_error {
            warn!(symbol = %symbol, error = %error, "price check failed");
            return;
        }

        error!(symbol = %symbol, error = %error, "price check failed, monitor in error state");
        self.notify_observers(&MonitorEvent::Lifecycle(LifecycleEvent::now(
            Lifecycle::Error {
                error,
                symbol: symbol.to_string(),
            },
        )));
    }

    fn heartbeat(&self) {
        let inner = self.inner.lock();
        if inner.state != MonitorState::Running {
            return;
        }

        let current = inner
            .history
            .latest()
            .map(|q| q.format_price(6))
            .unwrap_or_else(|| "N/A".to_string());

        info!(
            state = %inner.state,
            symbol = %inner.symbol.to_uppercase(),
            current = %current,
            checks = inner.stats.total_checks,
            "heartbeat"
        );
    }
}

/// Polls sequentially, so broadcasts follow quote order.
async fn poll_loop(monitor: Weak<Monitor>, run_id: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(monitor) = monitor.upgrade() else {
            break;
        };
        if monitor.inner.lock().run_id != run_id {
            break;
        }
        monitor.poll_once(run_id).await;
    }
}

async fn heartbeat_loop(monitor: Weak<Monitor>, run_id: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(monitor) = monitor.upgrade() else {
            break;
        };
        if monitor.inner.lock().run_id != run_id {
            break;
        }
        monitor.heartbeat();
    }
}

async fn recover_after(monitor: Weak<Monitor>, run_id: u64, delay: Duration) {
    sleep(delay).await;

    let Some(monitor) = monitor.upgrade() else {
        return;
    };
    let mut inner = monitor.inner.lock();
    if inner.run_id == run_id && inner.state == MonitorState::Error {
        inner.set_state(MonitorState::Running);
    }
}
