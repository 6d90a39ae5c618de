//! Exponentially aged estimate of the next phase duration.
//!
//! Classic exponential smoothing: each completed phase folds into the
//! running estimate as `estimate = factor * estimate + (1 - factor) *
//! observed`. The run is overdue once the time elapsed since the last
//! completed phase exceeds the tolerated span derived from that estimate.

use super::{Clock, EstimatorLifecycle, SystemClock, TimeoutEstimator, TimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Weight kept on the old estimate when a new observation folds in.
pub const DEFAULT_FACTOR: f64 = 0.5;

/// Initial estimate before any phase completes.
pub const DEFAULT_SEED: Duration = Duration::from_secs(60 * 60);

/// Multiplicative slack applied to the estimate.
pub const DEFAULT_MULTIPLICATIVE_SLACK: f64 = 0.5;

/// Additive slack applied on top.
pub const DEFAULT_ADDITIVE_SLACK: Duration = Duration::from_secs(5);

struct State {
    estimate: Duration,
    open_since: Option<Instant>,
    last_step: Option<Instant>,
}

pub struct AgeingEstimator {
    factor: f64,
    multiplicative_slack: f64,
    additive_slack: Duration,
    state: Mutex<State>,
    reached: AtomicBool,
    lifecycle: EstimatorLifecycle,
    clock: Arc<dyn Clock>,
}

impl AgeingEstimator {
    pub fn new(
        factor: f64,
        seed: Duration,
        multiplicative_slack: f64,
        additive_slack: Duration,
    ) -> Self {
        Self::with_clock(
            factor,
            seed,
            multiplicative_slack,
            additive_slack,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        factor: f64,
        seed: Duration,
        multiplicative_slack: f64,
        additive_slack: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            multiplicative_slack,
            additive_slack,
            state: Mutex::new(State {
                estimate: seed,
                open_since: None,
                last_step: None,
            }),
            reached: AtomicBool::new(false),
            lifecycle: EstimatorLifecycle::new(),
            clock,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_FACTOR,
            DEFAULT_SEED,
            DEFAULT_MULTIPLICATIVE_SLACK,
            DEFAULT_ADDITIVE_SLACK,
        )
    }

    fn tolerated(&self, estimate: Duration) -> Duration {
        estimate.mul_f64(1.0 + self.multiplicative_slack) + self.additive_slack
    }
}

impl TimeoutEstimator for AgeingEstimator {
    fn lifecycle(&self) -> &EstimatorLifecycle {
        &self.lifecycle
    }

    fn init(&self) -> Result<(), TimeoutError> {
        self.lifecycle.arm()?;
        // Arming anchors the idle clock so a run that never completes a
        // phase is still bounded by the seed tolerance.
        let mut state = self.state.lock();
        if state.last_step.is_none() {
            state.last_step = Some(self.clock.now());
        }
        Ok(())
    }

    fn record_start(&self) {
        let mut state = self.state.lock();
        let now = self.clock.now();
        if state.open_since.is_none() {
            state.open_since = Some(now);
        }
        // The first start anchors the clock for a run that never completes
        // a single phase.
        if state.last_step.is_none() {
            state.last_step = Some(now);
        }
    }

    fn record_end(&self) {
        let mut state = self.state.lock();
        let Some(opened) = state.open_since.take() else {
            return;
        };
        let now = self.clock.now();
        let observed = now.saturating_duration_since(opened);
        state.estimate =
            state.estimate.mul_f64(self.factor) + observed.mul_f64(1.0 - self.factor);
        state.last_step = Some(now);
    }

    fn reached(&self) -> bool {
        if self.reached.load(Ordering::Acquire) {
            return true;
        }
        let (last_step, estimate) = {
            let state = self.state.lock();
            match state.last_step {
                Some(last_step) => (last_step, state.estimate),
                None => return false,
            }
        };
        let idle = self.clock.now().saturating_duration_since(last_step);
        if idle > self.tolerated(estimate) {
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
        let state = self.state.lock();
        let tolerated = self.tolerated(state.estimate);
        match state.last_step {
            Some(last_step) => {
                let idle = self.clock.now().saturating_duration_since(last_step);
                Some(tolerated.saturating_sub(idle))
            }
            None => Some(tolerated),
        }
    }
}
