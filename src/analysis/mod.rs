//! The analysis loop driving measurement and contribution rounds.
//!
//! The controller owns the run: it asks a measurement tool for new facts,
//! feeds them onto the board, then lets the registered contributors work
//! the board to a fixpoint, and finally consults the judge about stopping.
//! Contributors follow a strict two-step protocol: `can_contribute` is a
//! pure function of board content, and a contributor that just contributed
//! must report `false` until the board changes in a way relevant to it.

pub mod aggregation;
pub mod proposers;

use crate::board::views::share;
use crate::board::{Board, BoardHandle, ReadOnlyView, ReadWriteView};
use crate::errors::PerfmapError;
use crate::judge::{FinalJudge, StopReason};
use crate::measurement::events::{MeasurementEvent, MeasurementOrder};
use crate::measurement::parser::EventParser;
use crate::measurement::MeasurableElement;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on contribution passes within one fixpoint. A loop that
/// needs this many passes has a contributor violating the self-exhaustion
/// contract.
pub const FIXPOINT_PASS_LIMIT: usize = 10_000;

/// A stateless analysis participant.
///
/// Implementations keep no run state in `self`; anything they need to
/// remember between calls lives in a board side-channel slot. That keeps a
/// freshly constructed contributor interchangeable with one that has been
/// running all along.
pub trait BoardContributor: Send + Sync {
    /// Short stable name for logs and summaries.
    fn name(&self) -> &str;

    /// Whether a call to [`contribute`](Self::contribute) would change the
    /// board right now. Must be a pure function of board content.
    fn can_contribute(&self, board: &ReadOnlyView) -> bool;

    /// Perform the contribution. Only called after `can_contribute`
    /// returned true for the same board content.
    fn contribute(&self, board: &ReadWriteView) -> Result<(), PerfmapError>;
}

/// Source of measurement events, real or replayed.
pub trait MeasurementTool: Send {
    /// Execute (or replay) the measurements `order` asks for.
    fn measure(&mut self, order: &MeasurementOrder)
        -> Result<Vec<MeasurementEvent>, PerfmapError>;
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every question on the board was answered.
    AllQuestionsClosed,
    /// Overall fitness stopped improving.
    FitnessPlateaued,
    /// The timeout estimator cut the run short.
    TimeBudgetExhausted,
    /// The hard wall-clock ceiling cut the run short.
    CeilingExceeded,
    /// The round limit cut the run short.
    RoundLimitHit,
}

impl RunOutcome {
    /// Whether the run ended because the model was done, rather than
    /// because time or rounds ran out.
    pub fn converged(&self) -> bool {
        matches!(
            self,
            RunOutcome::AllQuestionsClosed | RunOutcome::FitnessPlateaued
        )
    }
}

impl From<StopReason> for RunOutcome {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::TimeBudget => RunOutcome::TimeBudgetExhausted,
            StopReason::Ceiling => RunOutcome::CeilingExceeded,
            StopReason::Plateau => RunOutcome::FitnessPlateaued,
        }
    }
}

/// What a finished run produced.
#[derive(Clone)]
pub struct RunSummary {
    pub rounds: usize,
    pub contribution_passes: usize,
    pub dropped_events: usize,
    pub outcome: RunOutcome,
    pub board: BoardHandle,
}

impl std::fmt::Debug for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSummary")
            .field("rounds", &self.rounds)
            .field("contribution_passes", &self.contribution_passes)
            .field("dropped_events", &self.dropped_events)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

pub struct AnalysisController {
    universe: Vec<MeasurableElement>,
    contributors: Vec<Box<dyn BoardContributor>>,
    judge: FinalJudge,
    max_rounds: usize,
    show_progress: bool,
}

impl AnalysisController {
    pub fn new(
        universe: Vec<MeasurableElement>,
        contributors: Vec<Box<dyn BoardContributor>>,
        judge: FinalJudge,
        max_rounds: usize,
    ) -> Self {
        Self {
            universe,
            contributors,
            judge,
            max_rounds,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Drive the full campaign: measurement rounds alternated with
    /// contribution fixpoints until the judge terminates the run or every
    /// question closes.
    pub fn run(&mut self, tool: &mut dyn MeasurementTool) -> Result<RunSummary, PerfmapError> {
        let board = share(Board::new(self.universe.iter().cloned()));
        let writer = ReadWriteView::new(Arc::clone(&board));
        self.judge.init(&writer)?;

        let spinner = self.spinner();
        let mut rounds = 0usize;
        let mut passes = 0usize;
        let mut dropped = 0usize;
        let mut outcome = RunOutcome::RoundLimitHit;

        while rounds < self.max_rounds {
            let open = writer.open_questions();
            if open.is_empty() {
                info!("all questions answered after {rounds} round(s)");
                outcome = RunOutcome::AllQuestionsClosed;
                break;
            }
            rounds += 1;
            if let Some(bar) = &spinner {
                bar.set_message(format!("round {rounds}, {} open question(s)", open.len()));
                bar.tick();
            }

            dropped += self.measurement_round(tool, &writer)?;
            passes += self.contribution_fixpoint(&writer)?;

            if let Some(reason) = self.judge.judge(&writer)? {
                info!("judge stopped the run after {rounds} round(s): {reason:?}");
                outcome = reason.into();
                break;
            }
        }
        if let Some(bar) = &spinner {
            bar.finish_and_clear();
        }
        if outcome == RunOutcome::RoundLimitHit {
            warn!("round limit {} hit before convergence", self.max_rounds);
        }

        Ok(RunSummary {
            rounds,
            contribution_passes: passes,
            dropped_events: dropped,
            outcome,
            board,
        })
    }

    /// One measurement round: build the order from open questions, run the
    /// tool, parse the stream, feed results onto the board. Returns the
    /// dropped-event count for the round.
    fn measurement_round(
        &mut self,
        tool: &mut dyn MeasurementTool,
        board: &ReadWriteView,
    ) -> Result<usize, PerfmapError> {
        let open: Vec<MeasurableElement> = board.open_questions().into_iter().collect();
        let order = build_order(&open);
        if order.is_empty() {
            return Ok(0);
        }
        self.judge.record_measurement_start();
        let events = tool.measure(&order);
        self.judge.record_measurement_end();
        let events = events?;
        debug!("measurement round produced {} event(s)", events.len());

        let parser = EventParser::new(&events, &self.universe);
        for (element, results) in parser.all_results() {
            board.add_results(element, results.iter().cloned())?;
        }
        Ok(parser.dropped_events())
    }

    /// Run contributors round-robin until a full pass changes nothing.
    fn contribution_fixpoint(&self, board: &ReadWriteView) -> Result<usize, PerfmapError> {
        let reader = board.as_read_only();
        let mut passes = 0usize;
        loop {
            passes += 1;
            if passes > FIXPOINT_PASS_LIMIT {
                return Err(PerfmapError::FixpointDiverged {
                    limit: FIXPOINT_PASS_LIMIT,
                });
            }
            let mut contributed = false;
            for contributor in &self.contributors {
                if contributor.can_contribute(&reader) {
                    debug!("contributor {} acting", contributor.name());
                    contributor.contribute(board)?;
                    contributed = true;
                }
            }
            if !contributed {
                break;
            }
        }
        Ok(passes)
    }

    fn spinner(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Some(bar)
    }
}

/// Compose a measurement order covering exactly the given open elements.
pub fn build_order(open: &[MeasurableElement]) -> MeasurementOrder {
    let mut order = MeasurementOrder::default();
    for element in open {
        match element {
            MeasurableElement::ResourceDemand { section, .. } => {
                order.resource_demand_sections.push(section.clone());
            }
            MeasurableElement::Branch {
                section,
                alternatives,
            } => {
                order.execution_sections.push(section.clone());
                order.execution_sections.extend(alternatives.iter().cloned());
            }
            MeasurableElement::Loop { section, body } => {
                order.execution_sections.push(section.clone());
                order.execution_sections.push(body.clone());
            }
            MeasurableElement::Parameter { section, .. } => {
                order.parameter_sections.push(section.clone());
            }
        }
    }
    order
}
