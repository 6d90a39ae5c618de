//! Trend-based estimator over recent phase durations.
//!
//! Keeps a sliding window of completed phase durations, fits a least-squares
//! line over them, and extrapolates where the trend will sit one window
//! beyond the newest sample. The run is overdue once the time elapsed since
//! the last completed phase exceeds that prediction plus a fixed tolerance:
//! whatever is happening now is taking longer than the trend says any phase
//! should.

use super::{Clock, EstimatorLifecycle, SystemClock, TimeoutEstimator};
use crate::stats::least_squares_over_index;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of recent phase durations the regression is fitted over.
pub const DEFAULT_WINDOW: usize = 10;

/// Fixed tolerance added on top of the predicted phase duration.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(30);

struct Phases {
    open_since: Option<Instant>,
    last_completed: Option<Instant>,
    durations: Vec<Duration>,
}

pub struct RegressionEstimator {
    window: usize,
    tolerance: Duration,
    phases: Mutex<Phases>,
    reached: AtomicBool,
    lifecycle: EstimatorLifecycle,
    clock: Arc<dyn Clock>,
}

impl RegressionEstimator {
    pub fn new(window: usize, tolerance: Duration) -> Self {
        Self::with_clock(window, tolerance, Arc::new(SystemClock))
    }

    pub fn with_clock(window: usize, tolerance: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: window.max(2),
            tolerance,
            phases: Mutex::new(Phases {
                open_since: None,
                last_completed: None,
                durations: Vec::new(),
            }),
            reached: AtomicBool::new(false),
            lifecycle: EstimatorLifecycle::new(),
            clock,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_TOLERANCE)
    }

    /// Deadline for the phase currently underway: the moment of the last
    /// completed phase plus the extrapolated duration plus the tolerance.
    ///
    /// With samples indexed `0..n`, the trend is read at index `2n - 1`,
    /// one full window past the newest sample. `None` until the window has
    /// filled, so the estimator stays silent while the sample is thin.
    fn deadline(&self) -> Option<Instant> {
        let phases = self.phases.lock();
        if phases.durations.len() < self.window {
            return None;
        }
        let last_completed = phases.last_completed?;
        let recent = &phases.durations[phases.durations.len() - self.window..];
        let samples: Vec<f64> = recent.iter().map(Duration::as_secs_f64).collect();
        let (slope, intercept) = least_squares_over_index(&samples)?;
        let horizon = (2 * samples.len()) as f64 - 1.0;
        let predicted = Duration::from_secs_f64((slope * horizon + intercept).max(0.0));
        Some(last_completed + predicted + self.tolerance)
    }
}

impl TimeoutEstimator for RegressionEstimator {
    fn lifecycle(&self) -> &EstimatorLifecycle {
        &self.lifecycle
    }

    fn record_start(&self) {
        let mut phases = self.phases.lock();
        if phases.open_since.is_none() {
            phases.open_since = Some(self.clock.now());
        }
    }

    fn record_end(&self) {
        let mut phases = self.phases.lock();
        let Some(opened) = phases.open_since.take() else {
            return;
        };
        let now = self.clock.now();
        phases.durations.push(now.saturating_duration_since(opened));
        phases.last_completed = Some(now);
        // Two windows of history are plenty for a one-window fit.
        let cap = self.window * 2;
        if phases.durations.len() > cap {
            let excess = phases.durations.len() - cap;
            phases.durations.drain(..excess);
        }
    }

    fn reached(&self) -> bool {
        if self.reached.load(Ordering::Acquire) {
            return true;
        }
        let deadline = match self.deadline() {
            Some(deadline) => deadline,
            None => return false,
        };
        if self.clock.now() > deadline {
            self.reached.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn remaining(&self) -> Option<Duration> {
        if self.reached.load(Ordering::Acquire) {
            return Some(Duration::ZERO);
        }
        let deadline = self.deadline()?;
        Some(deadline.saturating_duration_since(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ManualClock;
    use super::*;

    fn run_phases(estimator: &RegressionEstimator, clock: &ManualClock, millis: &[u64]) {
        for &ms in millis {
            estimator.record_start();
            clock.advance(Duration::from_millis(ms));
            estimator.record_end();
        }
    }

    #[test]
    fn silent_until_the_window_fills() {
        let clock = ManualClock::new();
        let estimator = RegressionEstimator::with_clock(
            10,
            Duration::from_millis(500),
            Arc::new(clock.clone()),
        );
        run_phases(&estimator, &clock, &[0; 9]);
        clock.advance(Duration::from_secs(60));
        assert!(!estimator.reached());
        assert_eq!(estimator.remaining(), None);
    }

    #[test]
    fn zero_cost_steps_then_silence_trips_the_estimator() {
        let clock = ManualClock::new();
        let estimator = RegressionEstimator::with_clock(
            10,
            Duration::from_millis(500),
            Arc::new(clock.clone()),
        );
        run_phases(&estimator, &clock, &[0; 10]);
        assert!(!estimator.reached());

        clock.advance(Duration::from_millis(1000));
        assert!(estimator.reached());
        assert_eq!(estimator.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn steady_phases_within_the_predicted_pace_are_fine() {
        let clock = ManualClock::new();
        let estimator = RegressionEstimator::with_clock(
            4,
            Duration::from_millis(500),
            Arc::new(clock.clone()),
        );
        run_phases(&estimator, &clock, &[100, 100, 100, 100, 100, 100]);
        clock.advance(Duration::from_millis(200));
        assert!(!estimator.reached());
        assert!(estimator.remaining().is_some());
    }

    #[test]
    fn growing_trend_stretches_the_deadline() {
        let clock = ManualClock::new();
        let estimator = RegressionEstimator::with_clock(
            4,
            Duration::from_millis(100),
            Arc::new(clock.clone()),
        );
        // Slope 100ms per phase; the fit read at horizon index 7 predicts
        // 800ms, so 700ms of silence is still within budget.
        run_phases(&estimator, &clock, &[100, 200, 300, 400]);
        clock.advance(Duration::from_millis(700));
        assert!(!estimator.reached());
        clock.advance(Duration::from_millis(300));
        assert!(estimator.reached());
    }

    #[test]
    fn reached_stays_reached_after_further_steps() {
        let clock = ManualClock::new();
        let estimator = RegressionEstimator::with_clock(
            4,
            Duration::from_millis(100),
            Arc::new(clock.clone()),
        );
        run_phases(&estimator, &clock, &[10, 10, 10, 10]);
        clock.advance(Duration::from_secs(5));
        assert!(estimator.reached());
        run_phases(&estimator, &clock, &[10, 10, 10, 10]);
        assert!(estimator.reached());
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let estimator = RegressionEstimator::with_defaults();
        estimator.record_end();
        assert!(!estimator.reached());
    }
}
