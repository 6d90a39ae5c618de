//! Double-dispatch traversal over expression trees.

use super::{ExprRef, Expression};
use std::collections::BTreeSet;

/// Visitor with one hook per operator variant.
///
/// Default implementations do nothing, so a visitor only overrides the
/// variants it cares about. Traversal into children is the visitor's
/// decision; [`walk_children`] descends one level.
pub trait ExpressionVisitor {
    fn visit_constant(&mut self, _value: f64) {}
    fn visit_variable(&mut self, _name: &str) {}
    fn visit_addition(&mut self, _operands: &[ExprRef]) {}
    fn visit_multiplication(&mut self, _operands: &[ExprRef]) {}
    fn visit_subtraction(&mut self, _minuend: &ExprRef, _subtrahend: &ExprRef) {}
    fn visit_division(&mut self, _dividend: &ExprRef, _divisor: &ExprRef) {}
    fn visit_sine(&mut self, _operand: &ExprRef) {}
    fn visit_natural_logarithm(&mut self, _operand: &ExprRef) {}
    fn visit_exponential(&mut self, _operand: &ExprRef) {}
    fn visit_logarithm(&mut self, _base: &ExprRef, _antilogarithm: &ExprRef) {}
    fn visit_power(&mut self, _base: &ExprRef, _exponent: &ExprRef) {}
    fn visit_comparison(&mut self, _left: &ExprRef, _right: &ExprRef) {}
    fn visit_if_then_else(&mut self, _condition: &ExprRef, _then: &ExprRef, _otherwise: &ExprRef) {}
}

impl Expression {
    /// Dispatch to the visitor hook matching this node's variant.
    pub fn receive(&self, visitor: &mut dyn ExpressionVisitor) {
        match self {
            Expression::Constant(value) => visitor.visit_constant(*value),
            Expression::Variable(name) => visitor.visit_variable(name),
            Expression::Addition(operands) => visitor.visit_addition(operands),
            Expression::Multiplication(operands) => visitor.visit_multiplication(operands),
            Expression::Subtraction {
                minuend,
                subtrahend,
            } => visitor.visit_subtraction(minuend, subtrahend),
            Expression::Division { dividend, divisor } => {
                visitor.visit_division(dividend, divisor)
            }
            Expression::Sine(operand) => visitor.visit_sine(operand),
            Expression::NaturalLogarithm(operand) => visitor.visit_natural_logarithm(operand),
            Expression::Exponential(operand) => visitor.visit_exponential(operand),
            Expression::Logarithm {
                base,
                antilogarithm,
            } => visitor.visit_logarithm(base, antilogarithm),
            Expression::Power { base, exponent } => visitor.visit_power(base, exponent),
            Expression::Comparison { left, right } => visitor.visit_comparison(left, right),
            Expression::IfThenElse {
                condition,
                then,
                otherwise,
            } => visitor.visit_if_then_else(condition, then, otherwise),
        }
    }
}

/// Dispatch `visitor` over every direct child of `node`.
pub fn walk_children(node: &Expression, visitor: &mut dyn ExpressionVisitor) {
    for child in node.children() {
        child.receive(visitor);
    }
}

/// Collects the distinct variable names of a tree.
#[derive(Debug, Default)]
pub struct VariableCollector {
    names: BTreeSet<String>,
}

impl VariableCollector {
    /// All variable names occurring in `root`, sorted.
    pub fn collect(root: &ExprRef) -> BTreeSet<String> {
        let mut collector = VariableCollector::default();
        collector.descend(root);
        collector.names
    }

    fn descend(&mut self, node: &ExprRef) {
        node.receive(self);
        for child in node.children() {
            self.descend(child);
        }
    }
}

impl ExpressionVisitor for VariableCollector {
    fn visit_variable(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_variables_across_nesting() {
        let expr = Expression::if_then_else(
            Expression::comparison(Expression::variable("n"), Expression::constant(1.0)),
            Expression::variable("base"),
            Expression::multiplication(vec![
                Expression::variable("n"),
                Expression::variable("slope"),
            ])
            .unwrap(),
        );
        let names = VariableCollector::collect(&expr);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["base", "n", "slope"]
        );
    }

    #[test]
    fn receive_dispatches_on_variant() {
        #[derive(Default)]
        struct CountAdditions(usize);
        impl ExpressionVisitor for CountAdditions {
            fn visit_addition(&mut self, _operands: &[ExprRef]) {
                self.0 += 1;
            }
        }

        let sum =
            Expression::addition(vec![Expression::constant(1.0), Expression::constant(2.0)])
                .unwrap();
        let mut counter = CountAdditions::default();
        sum.receive(&mut counter);
        Expression::constant(1.0).receive(&mut counter);
        assert_eq!(counter.0, 1);
    }
}
