//! Subscriber plumbing shared by the alert manager and the monitor.
//!
//! Delivery is synchronous and ordered. Subscribers are untrusted: an
//! error or a panic in one is logged and the remaining ones still run.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc::{Sender, error::TrySendError};
use tracing::warn;

use corelib::ObserverError;

pub trait Observer<E>: Send + Sync {
    fn update(&self, event: &E) -> Result<(), ObserverError>;
}

/// Ordered subscriber list, de-duplicated by `Arc` identity.
pub struct ObserverSet<E> {
    observers: Vec<Arc<dyn Observer<E>>>,
}

impl<E> Default for ObserverSet<E> {
    fn default() -> Self {
        Self { observers: vec![] }
    }
}

impl<E> ObserverSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if this exact observer is already registered.
    pub fn add(&mut self, observer: Arc<dyn Observer<E>>) -> bool {
        if self.contains(&observer) {
            return false;
        }
        self.observers.push(observer);
        true
    }

    pub fn remove(&mut self, observer: &Arc<dyn Observer<E>>) -> bool {
        match self.observers.iter().position(|o| Arc::ptr_eq(o, observer)) {
            Some(idx) => {
                self.observers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, observer: &Arc<dyn Observer<E>>) -> bool {
        self.observers.iter().any(|o| Arc::ptr_eq(o, observer))
    }

    /// Cheap copy used to deliver outside of any lock.
    pub fn snapshot(&self) -> Vec<Arc<dyn Observer<E>>> {
        self.observers.clone()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// Delivers `event` to every observer in order. Returns how many failed.
pub fn notify_all<E>(observers: &[Arc<dyn Observer<E>>], event: &E) -> usize {
    let mut failures = 0;

    for observer in observers {
        let outcome = catch_unwind(AssertUnwindSafe(|| observer.update(event)))
            .unwrap_or_else(|payload| Err(ObserverError::Panicked(panic_message(payload))));

        if let Err(error) = outcome {
            failures += 1;
            warn!(error = %error, "observer failed to handle event");
        }
    }

    failures
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Forwards events into a bounded tokio channel without blocking.
pub struct ChannelObserver<E> {
    sender: Sender<E>,
}

impl<E> ChannelObserver<E> {
    pub fn new(sender: Sender<E>) -> Self {
        Self { sender }
    }
}

impl<E: Clone + Send> Observer<E> for ChannelObserver<E> {
    fn update(&self, event: &E) -> Result<(), ObserverError> {
        self.sender.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => ObserverError::ChannelFull,
            TrySendError::Closed(_) => ObserverError::ChannelClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u32>>,
    }

    impl Observer<u32> for Recorder {
        fn update(&self, event: &u32) -> Result<(), ObserverError> {
            self.seen.lock().push(*event);
            Ok(())
        }
    }

    struct Failing;

    impl Observer<u32> for Failing {
        fn update(&self, _: &u32) -> Result<(), ObserverError> {
            Err(ObserverError::Rejected("nope".into()))
        }
    }

    struct Panicking;

    impl Observer<u32> for Panicking {
        fn update(&self, _: &u32) -> Result<(), ObserverError> {
            panic!("observer blew up")
        }
    }

    #[test]
    fn adding_same_observer_twice_is_a_noop() {
        let mut set: ObserverSet<u32> = ObserverSet::new();
        let rec: Arc<dyn Observer<u32>> = Arc::new(Recorder::default());

        assert!(set.add(rec.clone()));
        assert!(!set.add(rec.clone()));
        assert_eq!(set.len(), 1);

        // A different instance of the same type is a different observer.
        assert!(set.add(Arc::new(Recorder::default())));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn remove_only_matches_identity() {
        let mut set: ObserverSet<u32> = ObserverSet::new();
        let a: Arc<dyn Observer<u32>> = Arc::new(Recorder::default());
        let b: Arc<dyn Observer<u32>> = Arc::new(Recorder::default());
        set.add(a.clone());

        assert!(!set.remove(&b));
        assert!(set.remove(&a));
        assert!(set.is_empty());
    }

    #[test]
    #[traced_test]
    fn failures_do_not_stop_delivery() {
        let first = Arc::new(Recorder::default());
        let last = Arc::new(Recorder::default());

        let observers: Vec<Arc<dyn Observer<u32>>> = vec![
            first.clone(),
            Arc::new(Failing),
            Arc::new(Panicking),
            last.clone(),
        ];

        let failures = notify_all(&observers, &7);

        assert_eq!(failures, 2);
        assert_eq!(*first.seen.lock(), vec![7]);
        assert_eq!(*last.seen.lock(), vec![7]);
        assert!(logs_contain("observer failed to handle event"));
        assert!(logs_contain("observer blew up"));
    }

    #[test]
    fn channel_observer_reports_full_and_closed() {
        let (tx, mut rx) = mpsc::channel(1);
        let obs = ChannelObserver::new(tx);

        assert!(obs.update(&1u32).is_ok());
        assert_eq!(obs.update(&2u32), Err(ObserverError::ChannelFull));
        assert_eq!(rx.try_recv().unwrap(), 1);

        drop(rx);
        assert_eq!(obs.update(&3u32), Err(ObserverError::ChannelClosed));
    }
}
