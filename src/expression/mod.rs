//! Immutable numeric expression trees.
//!
//! Proposed performance models are expression trees over named variables:
//! constants, arithmetic and transcendental operators, and a conditional.
//! Nodes are held behind `Arc` and never mutated after construction, so
//! trees can be shared freely between the board, analysers and reports.
//!
//! Builders validate arity and reject self-containing structures up front;
//! evaluation re-checks containment while walking so a malformed tree fails
//! with [`ExpressionError::SelfContainment`] instead of recursing forever.

pub mod eval;
pub mod visitor;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use eval::Assignment;
pub use visitor::{ExpressionVisitor, VariableCollector};

/// Shared handle to an expression node.
pub type ExprRef = Arc<Expression>;

/// Errors raised by expression construction and evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// A builder was given fewer operands than the operator requires.
    #[error("{operator} requires at least {minimum} operands, got {actual}")]
    Arity {
        operator: &'static str,
        minimum: usize,
        actual: usize,
    },

    /// A tree contains itself, directly or through a subtree.
    #[error("expression contains itself: {node}")]
    SelfContainment { node: String },

    /// Evaluation needed a variable the assignment does not bind.
    #[error("variable `{0}` is not bound in the assignment")]
    UnboundVariable(String),
}

/// One node of an immutable expression tree.
///
/// The set of operators is closed; evaluation and traversal are exhaustive
/// matches, so adding an operator is a compile-checked change everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(f64),
    Variable(String),
    /// n-ary sum, n >= 2.
    Addition(Vec<ExprRef>),
    /// n-ary product, n >= 2.
    Multiplication(Vec<ExprRef>),
    Subtraction {
        minuend: ExprRef,
        subtrahend: ExprRef,
    },
    Division {
        dividend: ExprRef,
        divisor: ExprRef,
    },
    Sine(ExprRef),
    NaturalLogarithm(ExprRef),
    Exponential(ExprRef),
    Logarithm {
        base: ExprRef,
        antilogarithm: ExprRef,
    },
    Power {
        base: ExprRef,
        exponent: ExprRef,
    },
    /// Evaluates to 1.0 when `left < right`, else 0.0.
    Comparison {
        left: ExprRef,
        right: ExprRef,
    },
    /// Picks `then` when the condition evaluates non-zero.
    IfThenElse {
        condition: ExprRef,
        then: ExprRef,
        otherwise: ExprRef,
    },
}

// Constants are interned by bit pattern so that two proposals of the same
// numeric value share one node and compare equal by pointer as well as by
// structure.
static CONSTANT_POOL: Lazy<Mutex<HashMap<u64, ExprRef>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

impl Expression {
    /// Interned constant node.
    pub fn constant(value: f64) -> ExprRef {
        let mut pool = CONSTANT_POOL.lock();
        pool.entry(value.to_bits())
            .or_insert_with(|| Arc::new(Expression::Constant(value)))
            .clone()
    }

    /// Named variable node.
    pub fn variable(name: impl Into<String>) -> ExprRef {
        Arc::new(Expression::Variable(name.into()))
    }

    /// n-ary sum; requires at least two operands.
    pub fn addition(operands: Vec<ExprRef>) -> Result<ExprRef, ExpressionError> {
        validate_arity("addition", &operands)?;
        Ok(Arc::new(Expression::Addition(operands)))
    }

    /// n-ary product; requires at least two operands.
    pub fn multiplication(operands: Vec<ExprRef>) -> Result<ExprRef, ExpressionError> {
        validate_arity("multiplication", &operands)?;
        Ok(Arc::new(Expression::Multiplication(operands)))
    }

    pub fn subtraction(minuend: ExprRef, subtrahend: ExprRef) -> ExprRef {
        Arc::new(Expression::Subtraction {
            minuend,
            subtrahend,
        })
    }

    pub fn division(dividend: ExprRef, divisor: ExprRef) -> ExprRef {
        Arc::new(Expression::Division { dividend, divisor })
    }

    pub fn sine(operand: ExprRef) -> ExprRef {
        Arc::new(Expression::Sine(operand))
    }

    pub fn natural_logarithm(operand: ExprRef) -> ExprRef {
        Arc::new(Expression::NaturalLogarithm(operand))
    }

    pub fn exponential(operand: ExprRef) -> ExprRef {
        Arc::new(Expression::Exponential(operand))
    }

    pub fn logarithm(base: ExprRef, antilogarithm: ExprRef) -> ExprRef {
        Arc::new(Expression::Logarithm {
            base,
            antilogarithm,
        })
    }

    pub fn power(base: ExprRef, exponent: ExprRef) -> ExprRef {
        Arc::new(Expression::Power { base, exponent })
    }

    pub fn comparison(left: ExprRef, right: ExprRef) -> ExprRef {
        Arc::new(Expression::Comparison { left, right })
    }

    pub fn if_then_else(condition: ExprRef, then: ExprRef, otherwise: ExprRef) -> ExprRef {
        Arc::new(Expression::IfThenElse {
            condition,
            then,
            otherwise,
        })
    }

    /// Direct child nodes, in operand order.
    pub fn children(&self) -> Vec<&ExprRef> {
        match self {
            Expression::Constant(_) | Expression::Variable(_) => vec![],
            Expression::Addition(operands) | Expression::Multiplication(operands) => {
                operands.iter().collect()
            }
            Expression::Subtraction {
                minuend,
                subtrahend,
            } => vec![minuend, subtrahend],
            Expression::Division { dividend, divisor } => vec![dividend, divisor],
            Expression::Sine(operand)
            | Expression::NaturalLogarithm(operand)
            | Expression::Exponential(operand) => vec![operand],
            Expression::Logarithm {
                base,
                antilogarithm,
            } => vec![base, antilogarithm],
            Expression::Power { base, exponent } => vec![base, exponent],
            Expression::Comparison { left, right } => vec![left, right],
            Expression::IfThenElse {
                condition,
                then,
                otherwise,
            } => vec![condition, then, otherwise],
        }
    }

    /// Operator name of this node, safe to render even for malformed trees.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Constant(_) => "constant",
            Expression::Variable(_) => "variable",
            Expression::Addition(_) => "addition",
            Expression::Multiplication(_) => "multiplication",
            Expression::Subtraction { .. } => "subtraction",
            Expression::Division { .. } => "division",
            Expression::Sine(_) => "sine",
            Expression::NaturalLogarithm(_) => "natural logarithm",
            Expression::Exponential(_) => "exponential",
            Expression::Logarithm { .. } => "logarithm",
            Expression::Power { .. } => "power",
            Expression::Comparison { .. } => "comparison",
            Expression::IfThenElse { .. } => "if-then-else",
        }
    }

    /// True when `node` occurs in this tree, compared by pointer identity.
    pub fn contains(&self, node: &ExprRef) -> bool {
        self.children().into_iter().any(|child| {
            Arc::ptr_eq(child, node) || child.contains(node)
        })
    }
}

/// Interned constant node.
pub fn constant(value: f64) -> ExprRef {
    Expression::constant(value)
}

/// Named variable node.
pub fn variable(name: impl Into<String>) -> ExprRef {
    Expression::variable(name)
}

/// n-ary sum; requires at least two operands.
pub fn addition(operands: Vec<ExprRef>) -> Result<ExprRef, ExpressionError> {
    Expression::addition(operands)
}

/// n-ary product; requires at least two operands.
pub fn multiplication(operands: Vec<ExprRef>) -> Result<ExprRef, ExpressionError> {
    Expression::multiplication(operands)
}

/// Walk `root` and fail if any node is its own ancestor.
///
/// Trees built through the public constructors cannot alias a node into
/// itself, but trees assembled elsewhere can; run this before trusting one.
pub fn check_recursion(root: &ExprRef) -> Result<(), ExpressionError> {
    fn walk(node: &ExprRef, ancestors: &mut Vec<*const Expression>) -> Result<(), ExpressionError> {
        let ptr = Arc::as_ptr(node);
        if ancestors.contains(&ptr) {
            // Display would recurse into the cycle, so name the node kind only.
            return Err(ExpressionError::SelfContainment {
                node: node.kind_name().to_string(),
            });
        }
        ancestors.push(ptr);
        for child in node.children() {
            walk(child, ancestors)?;
        }
        ancestors.pop();
        Ok(())
    }
    walk(root, &mut Vec::new())
}

fn validate_arity(operator: &'static str, operands: &[ExprRef]) -> Result<(), ExpressionError> {
    if operands.len() < 2 {
        return Err(ExpressionError::Arity {
            operator,
            minimum: 2,
            actual: operands.len(),
        });
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{value}"),
            Expression::Variable(name) => write!(f, "{name}"),
            Expression::Addition(operands) => write_infix(f, operands, " + "),
            Expression::Multiplication(operands) => write_infix(f, operands, " * "),
            Expression::Subtraction {
                minuend,
                subtrahend,
            } => write!(f, "({minuend} - {subtrahend})"),
            Expression::Division { dividend, divisor } => {
                write!(f, "({dividend} / {divisor})")
            }
            Expression::Sine(operand) => write!(f, "sin({operand})"),
            Expression::NaturalLogarithm(operand) => write!(f, "ln({operand})"),
            Expression::Exponential(operand) => write!(f, "exp({operand})"),
            Expression::Logarithm {
                base,
                antilogarithm,
            } => write!(f, "log({base}, {antilogarithm})"),
            Expression::Power { base, exponent } => write!(f, "({base} ^ {exponent})"),
            Expression::Comparison { left, right } => write!(f, "({left} < {right})"),
            Expression::IfThenElse {
                condition,
                then,
                otherwise,
            } => write!(f, "if {condition} then {then} else {otherwise}"),
        }
    }
}

fn write_infix(f: &mut fmt::Formatter<'_>, operands: &[ExprRef], separator: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{operand}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_interned_by_value() {
        let a = Expression::constant(42.5);
        let b = Expression::constant(42.5);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_constants_are_distinct_nodes() {
        let a = Expression::constant(1.0);
        let b = Expression::constant(2.0);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a, b);
    }

    #[test]
    fn addition_rejects_fewer_than_two_operands() {
        let err = Expression::addition(vec![Expression::constant(1.0)]).unwrap_err();
        assert_eq!(
            err,
            ExpressionError::Arity {
                operator: "addition",
                minimum: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn multiplication_rejects_empty_operands() {
        let err = Expression::multiplication(vec![]).unwrap_err();
        assert!(matches!(err, ExpressionError::Arity { actual: 0, .. }));
    }

    #[test]
    fn contains_finds_transitive_subtree() {
        let x = Expression::variable("x");
        let inner = Expression::sine(x.clone());
        let outer = Expression::subtraction(inner.clone(), Expression::constant(1.0));
        assert!(outer.contains(&x));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn check_recursion_accepts_shared_subtrees() {
        // A diamond: the same node used twice is sharing, not a cycle.
        let x = Expression::variable("x");
        let sum = Expression::addition(vec![x.clone(), x.clone()]).unwrap();
        assert!(check_recursion(&sum).is_ok());
    }

    #[test]
    fn display_renders_stable_infix() {
        let expr = Expression::if_then_else(
            Expression::comparison(Expression::variable("n"), Expression::constant(10.0)),
            Expression::constant(1.0),
            Expression::division(Expression::variable("n"), Expression::constant(2.0)),
        );
        assert_eq!(expr.to_string(), "if (n < 10) then 1 else (n / 2)");
    }
}
