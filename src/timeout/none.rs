//! Estimator that never expires.

use super::{EstimatorLifecycle, TimeoutEstimator};
use std::time::Duration;

/// No time limit at all. Useful when some other criterion, typically
/// convergence, is the sole stopping condition. Registered callbacks never
/// fire.
#[derive(Default)]
pub struct NoTimeout {
    lifecycle: EstimatorLifecycle,
}

impl NoTimeout {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeoutEstimator for NoTimeout {
    fn lifecycle(&self) -> &EstimatorLifecycle {
        &self.lifecycle
    }

    fn record_start(&self) {}

    fn record_end(&self) {}

    fn reached(&self) -> bool {
        false
    }

    fn remaining(&self) -> Option<Duration> {
        None
    }
}
