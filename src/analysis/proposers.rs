//! Contributors that propose candidate expressions from measured facts.

use super::BoardContributor;
use crate::board::{ReadOnlyView, ReadWriteView};
use crate::errors::PerfmapError;
use crate::expression::eval::Assignment;
use crate::expression::{addition, constant, multiplication, variable, ExprRef};
use crate::measurement::results::MeasurementResult;
use crate::measurement::MeasurableElement;
use crate::stats::{least_squares_line, mean};
use im::Vector;
use log::debug;

/// Proposes the arithmetic mean of an element's numeric facts as a constant
/// expression.
///
/// The simplest possible model and therefore always worth having on the
/// board as a baseline. Exhausts itself per element once a structurally
/// equal proposal is present; interned constants make that an identity
/// check for the common case.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanValueProposer;

impl MeanValueProposer {
    fn proposal_for(results: &Vector<MeasurementResult>) -> Option<ExprRef> {
        let samples: Vec<f64> = results
            .iter()
            .filter_map(MeasurementResult::numeric_value)
            .collect();
        mean(&samples).map(constant)
    }

    fn pending_for(board: &ReadOnlyView, element: &MeasurableElement) -> Option<ExprRef> {
        let results = board.results_for(element).ok()?;
        let proposal = Self::proposal_for(&results)?;
        let existing = board.proposals_for(element).ok()?;
        if existing.iter().any(|known| *known == proposal) {
            None
        } else {
            Some(proposal)
        }
    }
}

impl BoardContributor for MeanValueProposer {
    fn name(&self) -> &str {
        "mean-value"
    }

    fn can_contribute(&self, board: &ReadOnlyView) -> bool {
        board
            .universe()
            .iter()
            .any(|element| Self::pending_for(board, element).is_some())
    }

    fn contribute(&self, board: &ReadWriteView) -> Result<(), PerfmapError> {
        let reader = board.as_read_only();
        for element in board.universe() {
            if let Some(proposal) = Self::pending_for(&reader, &element) {
                debug!("mean-value proposal {proposal} for {}", element.id());
                board.add_proposal(&element, proposal)?;
            }
        }
        Ok(())
    }
}

/// Fits `a * x + b` over the facts of elements whose parameterisations share
/// a single common variable.
///
/// Needs at least two facts with distinct bindings; degenerate fits (a
/// vertical spread over one x value) produce nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearLawProposer;

impl LinearLawProposer {
    /// The one variable bound by every parameterised fact, if such a
    /// variable exists.
    fn common_variable(results: &Vector<MeasurementResult>) -> Option<String> {
        let mut candidates: Option<Vec<String>> = None;
        for result in results {
            let bound: Vec<String> = result
                .parameterisation
                .as_ref()?
                .variable_names()
                .map(str::to_owned)
                .collect();
            candidates = Some(match candidates {
                None => bound,
                Some(previous) => previous.into_iter().filter(|v| bound.contains(v)).collect(),
            });
        }
        let mut candidates = candidates?;
        candidates.sort_unstable();
        candidates.into_iter().next()
    }

    fn proposal_for(results: &Vector<MeasurementResult>) -> Option<ExprRef> {
        let variable_name = Self::common_variable(results)?;
        let points: Vec<(f64, f64)> = results
            .iter()
            .filter_map(|result| {
                let y = result.numeric_value()?;
                let assignment: Assignment =
                    result.parameterisation.as_ref()?.as_assignment();
                let x = assignment.get(&variable_name).copied()?;
                Some((x, y))
            })
            .collect();
        let (slope, intercept) = least_squares_line(&points)?;
        let law = addition(vec![
            multiplication(vec![constant(slope), variable(&variable_name)]).ok()?,
            constant(intercept),
        ])
        .ok()?;
        Some(law)
    }

    fn pending_for(board: &ReadOnlyView, element: &MeasurableElement) -> Option<ExprRef> {
        let results = board.results_for(element).ok()?;
        let proposal = Self::proposal_for(&results)?;
        let existing = board.proposals_for(element).ok()?;
        if existing.iter().any(|known| *known == proposal) {
            None
        } else {
            Some(proposal)
        }
    }
}

impl BoardContributor for LinearLawProposer {
    fn name(&self) -> &str {
        "linear-law"
    }

    fn can_contribute(&self, board: &ReadOnlyView) -> bool {
        board
            .universe()
            .iter()
            .any(|element| Self::pending_for(board, element).is_some())
    }

    fn contribute(&self, board: &ReadWriteView) -> Result<(), PerfmapError> {
        let reader = board.as_read_only();
        for element in board.universe() {
            if let Some(proposal) = Self::pending_for(&reader, &element) {
                debug!("linear-law proposal {proposal} for {}", element.id());
                board.add_proposal(&element, proposal)?;
            }
        }
        Ok(())
    }
}
