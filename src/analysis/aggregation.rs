//! Descriptive statistics kept alongside the board for reporting.

use super::BoardContributor;
use crate::board::{BoardParticipant, ReadOnlyView, ReadWriteView};
use crate::errors::PerfmapError;
use crate::measurement::results::MeasurementResult;
use log::debug;
use std::collections::BTreeMap;

/// Summary of one element's numeric facts.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementStatistics {
    pub samples: usize,
    pub mean: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl ElementStatistics {
    fn over<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MeasurementResult>,
    {
        let mut samples = 0usize;
        let mut total = 0.0;
        let mut minimum = f64::INFINITY;
        let mut maximum = f64::NEG_INFINITY;
        for value in values.into_iter().filter_map(MeasurementResult::numeric_value) {
            samples += 1;
            total += value;
            minimum = minimum.min(value);
            maximum = maximum.max(value);
        }
        if samples == 0 {
            return None;
        }
        Some(Self {
            samples,
            mean: total / samples as f64,
            minimum,
            maximum,
        })
    }
}

/// Keeps per-element statistics current in a board side-channel slot.
///
/// Stateless like every contributor: whether it has work is decided by
/// comparing the statistics computable from the board against the ones
/// stored, so a fresh instance picks up exactly where another stopped.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultStatisticsAnalyser;

impl BoardParticipant for ResultStatisticsAnalyser {
    type Slot = BTreeMap<String, ElementStatistics>;
}

impl ResultStatisticsAnalyser {
    fn current(board: &ReadOnlyView) -> BTreeMap<String, ElementStatistics> {
        let mut statistics = BTreeMap::new();
        for element in board.universe() {
            let Ok(results) = board.results_for(&element) else {
                continue;
            };
            if let Some(summary) = ElementStatistics::over(results.iter()) {
                statistics.insert(element.id(), summary);
            }
        }
        statistics
    }
}

impl BoardContributor for ResultStatisticsAnalyser {
    fn name(&self) -> &str {
        "result-statistics"
    }

    fn can_contribute(&self, board: &ReadOnlyView) -> bool {
        let computed = Self::current(board);
        if computed.is_empty() && board.slot::<Self>().is_none() {
            return false;
        }
        board.slot::<Self>().as_ref() != Some(&computed)
    }

    fn contribute(&self, board: &ReadWriteView) -> Result<(), PerfmapError> {
        let computed = Self::current(&board.as_read_only());
        debug!("statistics refreshed for {} element(s)", computed.len());
        board.store_slot::<Self>(computed);
        Ok(())
    }
}
