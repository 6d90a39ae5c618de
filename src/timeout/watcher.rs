//! Background thread that fires an estimator's callbacks when it expires.

use super::TimeoutEstimator;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Polling floor so a misestimating `remaining` cannot starve the watcher.
const MAX_SLEEP: Duration = Duration::from_secs(1);

struct Shared {
    sleeping: Mutex<()>,
    wake: Condvar,
    cancelled: AtomicBool,
}

/// Watches a [`TimeoutEstimator`] from its own thread and fires the
/// callbacks registered on the estimator exactly once when it reports
/// expiry.
///
/// Each wake-up re-queries `remaining` rather than trusting an earlier
/// figure, so estimators whose horizon moves (ageing, regression) are polled
/// honestly. Callbacks run on freshly spawned threads; a slow callback never
/// delays the others. Dropping the watcher cancels it without firing.
pub struct TimeoutWatcher {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl TimeoutWatcher {
    pub fn spawn(estimator: Arc<dyn TimeoutEstimator>) -> Self {
        let shared = Arc::new(Shared {
            sleeping: Mutex::new(()),
            wake: Condvar::new(),
            cancelled: AtomicBool::new(false),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("timeout-watcher".into())
            .spawn(move || watch(estimator, thread_shared))
            .ok();
        Self {
            shared,
            handle,
        }
    }

    /// Stop watching without firing any pending callbacks.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.wake.notify_all();
    }
}

impl Drop for TimeoutWatcher {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn watch(estimator: Arc<dyn TimeoutEstimator>, shared: Arc<Shared>) {
    loop {
        if shared.cancelled.load(Ordering::Acquire) {
            return;
        }
        if estimator.reached() {
            break;
        }
        let sleep = estimator
            .remaining()
            .map(|remaining| remaining.min(MAX_SLEEP))
            .unwrap_or(MAX_SLEEP)
            .max(Duration::from_millis(10));
        let mut guard = shared.sleeping.lock();
        // Spurious wakes are fine, the loop re-checks everything.
        shared.wake.wait_for(&mut guard, sleep);
    }

    let fired = estimator.lifecycle().fire();
    debug!("timeout reached, running {fired} callback(s)");
}

#[cfg(test)]
mod tests {
    use super::super::{FixedTimeout, NoTimeout};
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn fires_callbacks_registered_on_the_estimator() {
        let estimator = Arc::new(FixedTimeout::new(Duration::from_millis(50)));
        estimator.init().unwrap();
        let _watcher = TimeoutWatcher::spawn(estimator.clone());

        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        estimator.on_timeout(Box::new(move || tx.send("a").unwrap()));
        estimator.on_timeout(Box::new(move || tx2.send("b").unwrap()));

        let mut fired: Vec<&str> = vec![
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        fired.sort_unstable();
        assert_eq!(fired, vec!["a", "b"]);
    }

    #[test]
    fn late_registration_after_expiry_still_fires() {
        let estimator = Arc::new(FixedTimeout::new(Duration::ZERO));
        estimator.init().unwrap();
        let _watcher = TimeoutWatcher::spawn(estimator.clone());

        // Wait until the watcher has consumed the callback list.
        let (ready_tx, ready_rx) = mpsc::channel();
        estimator.on_timeout(Box::new(move || ready_tx.send(()).unwrap()));
        let _ = ready_rx.recv_timeout(Duration::from_secs(5));

        let (tx, rx) = mpsc::channel();
        estimator.on_timeout(Box::new(move || tx.send(()).unwrap()));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn cancelled_watcher_never_fires() {
        let estimator = Arc::new(NoTimeout::new());
        let watcher = TimeoutWatcher::spawn(estimator.clone());
        let (tx, rx) = mpsc::channel();
        estimator.on_timeout(Box::new(move || tx.send(()).unwrap()));
        watcher.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
