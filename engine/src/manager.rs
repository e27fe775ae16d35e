use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use corelib::{Alert, AlertEvent, AlertKind, PriceQuote, StrategyError};

use crate::observer::{Observer, ObserverSet, notify_all, panic_message};
use crate::strategy::AlertStrategy;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertStats {
    pub total: usize,
    pub by_kind: BTreeMap<AlertKind, usize>,
}

/// Runs the named strategies against each quote, keeps the alert history,
/// and fans alerts out to subscribers.
///
/// Strategies are trusted to be cheap but not to be correct: a failing or
/// panicking strategy is logged and skipped. Observers are notified outside
/// of every internal lock so they may call back into the manager.
#[derive(Default)]
pub struct AlertManager {
    /// Evaluation order is insertion order.
    strategies: Mutex<Vec<(String, AlertStrategy)>>,
    observers: Mutex<ObserverSet<AlertEvent>>,
    history: Mutex<Vec<Alert>>,
}

impl AlertManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `strategy` under `name`. An existing strategy with the same name
    /// is replaced in place, keeping its evaluation slot.
    pub fn add_strategy(&self, name: impl Into<String>, strategy: AlertStrategy) {
        let name = name.into();
        let mut strategies = self.strategies.lock();

        match strategies.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = strategy,
            None => strategies.push((name, strategy)),
        }
    }

    pub fn remove_strategy(&self, name: &str) -> bool {
        let mut strategies = self.strategies.lock();
        let before = strategies.len();
        strategies.retain(|(n, _)| n != name);
        strategies.len() != before
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Read access to one strategy's state.
    pub fn inspect_strategy<R>(&self, name: &str, f: impl FnOnce(&AlertStrategy) -> R) -> Option<R> {
        let strategies = self.strategies.lock();
        strategies.iter().find(|(n, _)| n == name).map(|(_, s)| f(s))
    }

    /// Evaluates every strategy, records and broadcasts whatever fired.
    pub fn check_alerts(&self, quote: &PriceQuote, history: &[PriceQuote]) -> Vec<Alert> {
        let fired = self.evaluate(quote, history);
        self.publish(&fired);
        fired
    }

    /// Runs the strategies only. Nothing is recorded and no observer is called,
    /// so callers may hold their own locks around it.
    pub fn evaluate(&self, quote: &PriceQuote, history: &[PriceQuote]) -> Vec<Alert> {
        let mut strategies = self.strategies.lock();
        strategies
            .iter_mut()
            .filter_map(|(name, strategy)| run_isolated(name, strategy, quote, history))
            .collect()
    }

    /// Records `alerts` and broadcasts them in order.
    pub fn publish(&self, alerts: &[Alert]) {
        for alert in alerts {
            debug!(kind = %alert.kind, symbol = %alert.symbol, price = alert.price, "alert fired");
            self.history.lock().push(alert.clone());
            self.notify_observers(&alert.to_event());
        }
    }

    /// Swaps in fresh strategies. Each one is removed and re-added, so it
    /// moves to the end of the evaluation order.
    pub fn replace_strategies(&self, fresh: Vec<(String, AlertStrategy)>) {
        let mut strategies = self.strategies.lock();
        for (name, strategy) in fresh {
            strategies.retain(|(n, _)| *n != name);
            strategies.push((name, strategy));
        }
    }

    /// Returns `false` if the observer was already registered.
    pub fn add_observer(&self, observer: Arc<dyn Observer<AlertEvent>>) -> bool {
        self.observers.lock().add(observer)
    }

    pub fn remove_observer(&self, observer: &Arc<dyn Observer<AlertEvent>>) -> bool {
        self.observers.lock().remove(observer)
    }

    pub fn notify_observers(&self, event: &AlertEvent) {
        let observers = self.observers.lock().snapshot();
        notify_all(&observers, event);
    }

    pub fn get_history(&self) -> Vec<Alert> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn get_stats(&self) -> AlertStats {
        let history = self.history.lock();
        let mut by_kind = BTreeMap::new();
        for alert in history.iter() {
            *by_kind.entry(alert.kind).or_insert(0) += 1;
        }

        AlertStats {
            total: history.len(),
            by_kind,
        }
    }
}

fn run_isolated(
    name: &str,
    strategy: &mut AlertStrategy,
    quote: &PriceQuote,
    history: &[PriceQuote],
) -> Option<Alert> {
    let outcome = catch_unwind(AssertUnwindSafe(|| strategy.check(quote, history)))
        .unwrap_or_else(|payload| Err(StrategyError::Panicked(panic_message(payload))));

    match outcome {
        Ok(alert) => alert,
        Err(e) => {
            match &e {
                StrategyError::Panicked(_) => {
                    error!(strategy = %name, error = %e, "strategy panicked, skipping")
                }
                _ => warn!(strategy = %name, error = %e, "strategy failed, skipping"),
            }
            None
        }
    }
}
