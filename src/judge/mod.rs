//! The final judge deciding when a campaign has run long enough.
//!
//! Termination combines three signals: the timeout estimator, a hard
//! wall-clock ceiling, and a fitness plateau. The judge keeps its run state
//! (start instant, fitness history, the termination verdict) in a board
//! side-channel slot rather than in `self`, so a freshly constructed judge
//! over the same board reproduces the verdict of the one it replaces. Once
//! terminated, a run stays terminated, and the verdict remembers why.

use crate::board::{BoardParticipant, ReadOnlyView, ReadWriteView};
use crate::config::JudgeConfig;
use crate::errors::PerfmapError;
use crate::fitness::best_proposal;
use crate::measurement::MeasurableElement;
use crate::timeout::TimeoutEstimator;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info};
use rayon::prelude::*;
use std::sync::Arc;

/// Why a run was terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The timeout estimator declared the time budget exhausted.
    TimeBudget,
    /// The hard wall-clock ceiling was exceeded.
    Ceiling,
    /// Overall fitness stopped improving.
    Plateau,
}

/// Run state the judge parks on the board.
#[derive(Clone, Debug, PartialEq)]
pub struct JudgeState {
    pub started_at: DateTime<Utc>,
    pub fitness_history: Vec<f64>,
    pub termination: Option<StopReason>,
}

pub struct FinalJudge {
    estimator: Arc<dyn TimeoutEstimator>,
    config: JudgeConfig,
}

impl BoardParticipant for FinalJudge {
    type Slot = JudgeState;
}

impl FinalJudge {
    pub fn new(estimator: Arc<dyn TimeoutEstimator>, config: JudgeConfig) -> Self {
        Self { estimator, config }
    }

    /// Record the campaign start. A board that already carries judge state
    /// keeps it, so replacing the judge mid-run does not reset the clock.
    pub fn init(&self, board: &ReadWriteView) -> Result<(), PerfmapError> {
        if board.slot::<Self>().is_none() {
            board.store_slot::<Self>(JudgeState {
                started_at: Utc::now(),
                fitness_history: Vec::new(),
                termination: None,
            });
        }
        Ok(())
    }

    /// A measured phase begins.
    pub fn record_measurement_start(&self) {
        self.estimator.record_start();
    }

    /// The phase opened by the last start completed.
    pub fn record_measurement_end(&self) {
        self.estimator.record_end();
    }

    /// Pass judgement on the current board. Returns the stop reason when
    /// the run is over; the verdict is final.
    pub fn judge(&self, board: &ReadWriteView) -> Result<Option<StopReason>, PerfmapError> {
        let mut state = match board.slot::<Self>() {
            Some(state) => state,
            None => {
                self.init(board)?;
                board.slot::<Self>().ok_or(PerfmapError::JudgeStateMissing)?
            }
        };
        if let Some(reason) = state.termination {
            return Ok(Some(reason));
        }

        if self.estimator.reached() {
            info!("time budget exhausted, terminating the run");
            return self.terminate(board, state, StopReason::TimeBudget);
        }
        let elapsed = Utc::now() - state.started_at;
        if elapsed > ChronoDuration::hours(self.config.ceiling_hours) {
            info!(
                "hard ceiling of {}h exceeded, terminating the run",
                self.config.ceiling_hours
            );
            return self.terminate(board, state, StopReason::Ceiling);
        }

        if let Some(fitness) = self.overall_fitness(&board.as_read_only()) {
            debug!("overall fitness {fitness}");
            state.fitness_history.push(fitness);
            if self.plateaued(&state.fitness_history) {
                info!("fitness plateaued at {fitness}, terminating the run");
                return self.terminate(board, state, StopReason::Plateau);
            }
        }

        board.store_slot::<Self>(state);
        Ok(None)
    }

    fn terminate(
        &self,
        board: &ReadWriteView,
        mut state: JudgeState,
        reason: StopReason,
    ) -> Result<Option<StopReason>, PerfmapError> {
        state.termination = Some(reason);
        board.store_slot::<Self>(state);
        Ok(Some(reason))
    }

    /// Mean of the per-element best fitness over all gradable elements,
    /// graded with the board's own fitness function.
    fn overall_fitness(&self, board: &ReadOnlyView) -> Option<f64> {
        let fitness = board.fitness();
        let elements: Vec<MeasurableElement> = board.universe().into_iter().collect();
        let grades: Vec<f64> = elements
            .par_iter()
            .filter_map(|element| {
                let proposals = board.proposals_for(element).ok()?;
                let results = board.results_for(element).ok()?;
                if proposals.is_empty() || results.is_empty() {
                    return None;
                }
                best_proposal(fitness.as_ref(), &proposals, &results).map(|(_, grade)| grade)
            })
            .collect();
        if grades.is_empty() {
            None
        } else {
            Some(grades.iter().sum::<f64>() / grades.len() as f64)
        }
    }

    /// Whether the last window of history shows negligible improvement.
    fn plateaued(&self, history: &[f64]) -> bool {
        let window = self.config.plateau_window;
        if window < 2 || history.len() < window {
            return false;
        }
        let recent = &history[history.len() - window..];
        let first = recent[0];
        let last = recent[window - 1];
        if !first.is_finite() || !last.is_finite() {
            return false;
        }
        let improvement = (first - last) / first.abs().max(f64::EPSILON);
        improvement < self.config.plateau_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::views::share;
    use crate::board::Board;
    use crate::expression::constant;
    use crate::measurement::results::{MeasurementResult, ResourceType};
    use crate::measurement::CodeSection;
    use crate::timeout::{FixedTimeout, NoTimeout};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn element() -> MeasurableElement {
        MeasurableElement::ResourceDemand {
            section: CodeSection::new("src/lib.rs", 0, 9),
            resource: ResourceType::Cpu,
        }
    }

    fn writer() -> ReadWriteView {
        ReadWriteView::new(share(Board::new(vec![element()])))
    }

    fn config(window: usize, threshold: f64) -> JudgeConfig {
        JudgeConfig {
            plateau_window: window,
            plateau_threshold: threshold,
            ceiling_hours: 72,
        }
    }

    #[test]
    fn init_is_idempotent_over_existing_state() {
        let board = writer();
        let judge = FinalJudge::new(Arc::new(NoTimeout::new()), config(5, 0.05));
        judge.init(&board).unwrap();
        let first = board.slot::<FinalJudge>().unwrap();
        judge.init(&board).unwrap();
        assert_eq!(board.slot::<FinalJudge>().unwrap(), first);
    }

    #[test]
    fn expired_estimator_terminates_and_stays_terminated() {
        let board = writer();
        let estimator = FixedTimeout::new(Duration::ZERO);
        estimator.record_start();
        let judge = FinalJudge::new(Arc::new(estimator), config(5, 0.05));
        judge.init(&board).unwrap();

        assert_eq!(judge.judge(&board).unwrap(), Some(StopReason::TimeBudget));
        // A fresh judge over the same board inherits the verdict, reason
        // included.
        let successor = FinalJudge::new(Arc::new(NoTimeout::new()), config(5, 0.05));
        assert_eq!(successor.judge(&board).unwrap(), Some(StopReason::TimeBudget));
    }

    #[test]
    fn plateaued_fitness_terminates_the_run() {
        let board = writer();
        board
            .add_results(
                &element(),
                vec![MeasurementResult::resource_demand(5.0, ResourceType::Cpu).unwrap()],
            )
            .unwrap();
        board.add_proposal(&element(), constant(5.0)).unwrap();

        let judge = FinalJudge::new(Arc::new(NoTimeout::new()), config(3, 0.05));
        judge.init(&board).unwrap();
        // A perfect constant fit never improves; the third round fills the
        // plateau window.
        assert!(judge.judge(&board).unwrap().is_none());
        assert!(judge.judge(&board).unwrap().is_none());
        assert_eq!(judge.judge(&board).unwrap(), Some(StopReason::Plateau));
    }

    #[test]
    fn no_gradable_proposals_means_no_plateau_history() {
        let board = writer();
        let judge = FinalJudge::new(Arc::new(NoTimeout::new()), config(2, 0.05));
        judge.init(&board).unwrap();
        for _ in 0..5 {
            assert!(judge.judge(&board).unwrap().is_none());
        }
        assert!(board
            .slot::<FinalJudge>()
            .unwrap()
            .fitness_history
            .is_empty());
    }

    #[test]
    fn steadily_improving_fitness_keeps_the_run_alive() {
        let judge = FinalJudge::new(Arc::new(NoTimeout::new()), config(3, 0.05));
        assert!(!judge.plateaued(&[10.0, 5.0, 2.0]));
        assert!(judge.plateaued(&[2.0, 2.0, 2.0]));
        assert!(judge.plateaued(&[2.0, 2.0, 1.99]));
    }
}
