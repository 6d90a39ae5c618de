//! Fixed wall-clock budget.

use super::{Clock, EstimatorLifecycle, SystemClock, TimeoutEstimator, TimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deadline a fixed duration after `init`, or after the first recorded
/// start for an estimator that was never explicitly armed.
///
/// The budget covers the whole campaign, not individual phases; `record_end`
/// carries no information for this estimator.
pub struct FixedTimeout {
    budget: Duration,
    started_at: Mutex<Option<Instant>>,
    reached: AtomicBool,
    lifecycle: EstimatorLifecycle,
    clock: Arc<dyn Clock>,
}

impl FixedTimeout {
    pub fn new(budget: Duration) -> Self {
        Self::with_clock(budget, Arc::new(SystemClock))
    }

    pub fn with_clock(budget: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            budget,
            started_at: Mutex::new(None),
            reached: AtomicBool::new(false),
            lifecycle: EstimatorLifecycle::new(),
            clock,
        }
    }

    fn anchor(&self) {
        let mut started = self.started_at.lock();
        if started.is_none() {
            *started = Some(self.clock.now());
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.started_at.lock().map(|start| start + self.budget)
    }
}

impl TimeoutEstimator for FixedTimeout {
    fn lifecycle(&self) -> &EstimatorLifecycle {
        &self.lifecycle
    }

    fn init(&self) -> Result<(), TimeoutError> {
        self.lifecycle.arm()?;
        self.anchor();
        Ok(())
    }

    fn record_start(&self) {
        self.anchor();
    }

    fn record_end(&self) {}

    fn reached(&self) -> bool {
        if self.reached.load(Ordering::Acquire) {
            return true;
        }
        let deadline = match self.deadline() {
            Some(deadline) => deadline,
            None => return false,
        };
        if self.clock.now() >= deadline {
            self.reached.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn remaining(&self) -> Option<Duration> {
        let deadline = self.deadline()?;
        Some(deadline.saturating_duration_since(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ManualClock;
    use super::*;

    #[test]
    fn not_reached_before_any_start() {
        let timeout = FixedTimeout::new(Duration::from_secs(1));
        assert!(!timeout.reached());
        assert_eq!(timeout.remaining(), None);
    }

    #[test]
    fn init_anchors_the_deadline_and_guards_against_rearming() {
        let clock = ManualClock::new();
        let timeout =
            FixedTimeout::with_clock(Duration::from_secs(10), Arc::new(clock.clone()));
        timeout.init().unwrap();
        assert!(timeout.init().is_err());

        clock.advance(Duration::from_secs(11));
        assert!(timeout.reached());
    }

    #[test]
    fn reached_once_the_budget_elapses() {
        let clock = ManualClock::new();
        let timeout =
            FixedTimeout::with_clock(Duration::from_secs(10), Arc::new(clock.clone()));
        timeout.record_start();
        assert!(!timeout.reached());

        clock.advance(Duration::from_secs(11));
        assert!(timeout.reached());
        assert_eq!(timeout.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn later_starts_do_not_move_the_deadline() {
        let clock = ManualClock::new();
        let timeout =
            FixedTimeout::with_clock(Duration::from_secs(10), Arc::new(clock.clone()));
        timeout.record_start();
        clock.advance(Duration::from_secs(9));
        timeout.record_end();
        timeout.record_start();
        clock.advance(Duration::from_secs(2));
        assert!(timeout.reached());
    }

    #[test]
    fn reached_is_sticky() {
        let clock = ManualClock::new();
        let timeout = FixedTimeout::with_clock(Duration::from_secs(1), Arc::new(clock.clone()));
        timeout.record_start();
        clock.advance(Duration::from_secs(2));
        assert!(timeout.reached());
        assert!(timeout.reached());
    }
}
