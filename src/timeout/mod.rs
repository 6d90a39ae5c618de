//! Run-duration estimation for long measurement campaigns.
//!
//! Estimators answer one question: has the campaign run long enough that
//! waiting further is unlikely to pay off? They never abort anything
//! themselves; the analysis loop and the [`watcher::TimeoutWatcher`] consult
//! them and act.
//!
//! All estimators share the [`TimeoutEstimator`] lifecycle: `init` arms the
//! estimator exactly once per run, `record_start` when a measured phase
//! begins, `record_end` when it completes, and `reached` / `remaining`
//! queries in between. Start/end calls must alternate; estimators are free
//! to ignore out-of-order calls. Expiry callbacks register on the estimator
//! itself and are fired by the [`watcher::TimeoutWatcher`].

pub mod ageing;
pub mod fixed;
pub mod none;
pub mod regression;
pub mod watcher;

pub use ageing::AgeingEstimator;
pub use fixed::FixedTimeout;
pub use none::NoTimeout;
pub use regression::RegressionEstimator;
pub use watcher::TimeoutWatcher;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    /// `init` was called on an estimator that is already armed.
    #[error("timeout estimator is already initialised")]
    AlreadyInitialised,
}

/// Time source abstraction so estimators can be driven deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<parking_lot::Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.inner.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.inner.lock()
    }
}

/// A registered expiry callback. Runs at most once, on its own thread.
pub type TimeoutCallback = Box<dyn FnOnce() + Send + 'static>;

pub(crate) fn run_detached(callback: TimeoutCallback) {
    let _ = thread::Builder::new()
        .name("timeout-callback".into())
        .spawn(callback);
}

/// Initialisation guard and expiry-callback registry shared by every
/// estimator variant.
pub struct EstimatorLifecycle {
    initialised: AtomicBool,
    callbacks: Mutex<Option<Vec<TimeoutCallback>>>,
}

impl Default for EstimatorLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimatorLifecycle {
    pub fn new() -> Self {
        Self {
            initialised: AtomicBool::new(false),
            callbacks: Mutex::new(Some(Vec::new())),
        }
    }

    /// Arm once; the second call fails loudly.
    pub fn arm(&self) -> Result<(), TimeoutError> {
        if self.initialised.swap(true, Ordering::AcqRel) {
            return Err(TimeoutError::AlreadyInitialised);
        }
        Ok(())
    }

    /// Queue `callback` for expiry, or run it right away if expiry already
    /// fired.
    pub fn register(&self, callback: TimeoutCallback) {
        let mut pending = self.callbacks.lock();
        match pending.as_mut() {
            Some(list) => list.push(callback),
            None => {
                drop(pending);
                run_detached(callback);
            }
        }
    }

    /// Run all queued callbacks detached and mark expiry as fired. Returns
    /// how many ran; later calls are no-ops.
    pub fn fire(&self) -> usize {
        let fired = self.callbacks.lock().take().unwrap_or_default();
        let count = fired.len();
        for callback in fired {
            run_detached(callback);
        }
        count
    }
}

/// A run-duration estimator.
///
/// Implementations are consulted concurrently from the analysis loop and the
/// watcher thread, so all methods take `&self`.
pub trait TimeoutEstimator: Send + Sync {
    /// Shared initialisation guard and callback registry.
    fn lifecycle(&self) -> &EstimatorLifecycle;

    /// Arm the estimator for a run.
    ///
    /// A second call fails with [`TimeoutError::AlreadyInitialised`];
    /// estimator state never survives into another run unnoticed. Variants
    /// that anchor a clock at arming time override this.
    fn init(&self) -> Result<(), TimeoutError> {
        self.lifecycle().arm()
    }

    /// Register `callback` to run once when the budget expires.
    ///
    /// Callbacks fire from a [`watcher::TimeoutWatcher`] observing this
    /// estimator; without one they never run.
    fn on_timeout(&self, callback: TimeoutCallback) {
        self.lifecycle().register(callback);
    }

    /// A measured phase begins now.
    fn record_start(&self);

    /// The phase opened by the last `record_start` completed.
    fn record_end(&self);

    /// Whether the estimator considers the allotted time exhausted.
    ///
    /// Must be monotonic: once true it stays true for the rest of the run.
    fn reached(&self) -> bool;

    /// Estimated time left before [`reached`](Self::reached) flips, if the
    /// estimator can produce one yet.
    fn remaining(&self) -> Option<Duration>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_loudly() {
        let estimator = NoTimeout::new();
        assert!(estimator.init().is_ok());
        assert_eq!(estimator.init(), Err(TimeoutError::AlreadyInitialised));
    }

    #[test]
    fn callbacks_registered_after_firing_run_immediately() {
        let lifecycle = EstimatorLifecycle::new();
        assert_eq!(lifecycle.fire(), 0);

        let (tx, rx) = std::sync::mpsc::channel();
        lifecycle.register(Box::new(move || tx.send(()).unwrap()));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
