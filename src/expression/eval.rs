//! Pure evaluation of expression trees over variable assignments.

use super::{ExprRef, Expression, ExpressionError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A variable binding handed to [`Expression::evaluate`].
///
/// Ordered so that snapshots render and compare deterministically.
pub type Assignment = BTreeMap<String, f64>;

impl Expression {
    /// Evaluate this tree under `assignment`.
    ///
    /// Deterministic and side-effect free. A variable missing from the
    /// assignment is an error, never a silent default, and a tree that
    /// contains itself fails before the walk can diverge.
    pub fn evaluate(self: &Arc<Self>, assignment: &Assignment) -> Result<f64, ExpressionError> {
        eval_guarded(self, assignment, &mut Vec::new())
    }
}

fn eval_guarded(
    node: &ExprRef,
    assignment: &Assignment,
    ancestors: &mut Vec<*const Expression>,
) -> Result<f64, ExpressionError> {
    let ptr = Arc::as_ptr(node);
    if ancestors.contains(&ptr) {
        return Err(ExpressionError::SelfContainment {
            node: node.kind_name().to_string(),
        });
    }
    ancestors.push(ptr);
    let value = eval_node(node, assignment, ancestors);
    ancestors.pop();
    value
}

fn eval_node(
    node: &ExprRef,
    assignment: &Assignment,
    ancestors: &mut Vec<*const Expression>,
) -> Result<f64, ExpressionError> {
    match node.as_ref() {
        Expression::Constant(value) => Ok(*value),
        Expression::Variable(name) => assignment
            .get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UnboundVariable(name.clone())),
        Expression::Addition(operands) => {
            fold_operands("addition", operands, assignment, ancestors, |a, b| a + b)
        }
        Expression::Multiplication(operands) => {
            fold_operands("multiplication", operands, assignment, ancestors, |a, b| a * b)
        }
        Expression::Subtraction {
            minuend,
            subtrahend,
        } => Ok(eval_guarded(minuend, assignment, ancestors)?
            - eval_guarded(subtrahend, assignment, ancestors)?),
        Expression::Division { dividend, divisor } => {
            Ok(eval_guarded(dividend, assignment, ancestors)?
                / eval_guarded(divisor, assignment, ancestors)?)
        }
        Expression::Sine(operand) => Ok(eval_guarded(operand, assignment, ancestors)?.sin()),
        Expression::NaturalLogarithm(operand) => {
            Ok(eval_guarded(operand, assignment, ancestors)?.ln())
        }
        Expression::Exponential(operand) => Ok(eval_guarded(operand, assignment, ancestors)?.exp()),
        Expression::Logarithm {
            base,
            antilogarithm,
        } => {
            let base = eval_guarded(base, assignment, ancestors)?;
            let antilogarithm = eval_guarded(antilogarithm, assignment, ancestors)?;
            Ok(antilogarithm.log(base))
        }
        Expression::Power { base, exponent } => {
            let base = eval_guarded(base, assignment, ancestors)?;
            let exponent = eval_guarded(exponent, assignment, ancestors)?;
            Ok(base.powf(exponent))
        }
        Expression::Comparison { left, right } => {
            let left = eval_guarded(left, assignment, ancestors)?;
            let right = eval_guarded(right, assignment, ancestors)?;
            Ok(if left < right { 1.0 } else { 0.0 })
        }
        Expression::IfThenElse {
            condition,
            then,
            otherwise,
        } => {
            let condition = eval_guarded(condition, assignment, ancestors)?;
            if condition != 0.0 {
                eval_guarded(then, assignment, ancestors)
            } else {
                eval_guarded(otherwise, assignment, ancestors)
            }
        }
    }
}

fn fold_operands(
    operator: &'static str,
    operands: &[ExprRef],
    assignment: &Assignment,
    ancestors: &mut Vec<*const Expression>,
    combine: fn(f64, f64) -> f64,
) -> Result<f64, ExpressionError> {
    let mut values = operands.iter();
    // Builders guarantee two operands; trees assembled by hand may not.
    let first = values.next().ok_or(ExpressionError::Arity {
        operator,
        minimum: 2,
        actual: 0,
    })?;
    let mut accumulated = eval_guarded(first, assignment, ancestors)?;
    for operand in values {
        accumulated = combine(accumulated, eval_guarded(operand, assignment, ancestors)?);
    }
    Ok(accumulated)
}
