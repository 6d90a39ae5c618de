//! Fitness grading of proposed expressions against measured facts.
//!
//! A fitness function answers: how far does this expression sit from what
//! was actually measured? Lower is better, zero is a perfect fit, and
//! `f64::INFINITY` marks proposals that cannot be graded at all (evaluation
//! failed, no numeric facts, unbound variables).

use crate::expression::eval::Assignment;
use crate::expression::ExprRef;
use crate::measurement::results::MeasurementResult;
use im::Vector;
use log::trace;

/// Grades one proposal against the result set of a single element.
pub trait FitnessFunction: Send + Sync {
    /// Lower is better; `f64::INFINITY` means ungradable.
    fn grade(&self, proposal: &ExprRef, results: &Vector<MeasurementResult>) -> f64;
}

/// Mean squared error between the expression, evaluated under each result's
/// parameterisation, and that result's measured numeric value.
///
/// Results without a numeric value are skipped. A result whose
/// parameterisation does not bind every variable the proposal uses makes
/// the whole proposal ungradable, as does any evaluation error.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanSquaredError;

impl FitnessFunction for MeanSquaredError {
    fn grade(&self, proposal: &ExprRef, results: &Vector<MeasurementResult>) -> f64 {
        let mut total = 0.0;
        let mut graded = 0usize;
        for result in results {
            let Some(measured) = result.numeric_value() else {
                continue;
            };
            let assignment: Assignment = result
                .parameterisation
                .as_ref()
                .map(|p| p.as_assignment())
                .unwrap_or_default();
            let predicted = match proposal.evaluate(&assignment) {
                Ok(value) => value,
                Err(fault) => {
                    trace!("ungradable proposal: {fault}");
                    return f64::INFINITY;
                }
            };
            if !predicted.is_finite() {
                return f64::INFINITY;
            }
            let error = predicted - measured;
            total += error * error;
            graded += 1;
        }
        if graded == 0 {
            f64::INFINITY
        } else {
            total / graded as f64
        }
    }
}

/// Grade `proposals` and return the best one with its fitness, if any
/// proposal is gradable at all.
pub fn best_proposal(
    fitness: &dyn FitnessFunction,
    proposals: &Vector<ExprRef>,
    results: &Vector<MeasurementResult>,
) -> Option<(ExprRef, f64)> {
    proposals
        .iter()
        .map(|proposal| (proposal.clone(), fitness.grade(proposal, results)))
        .filter(|(_, grade)| grade.is_finite())
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}
