//! Crate-wide error type.

use crate::board::BoardError;
use crate::expression::ExpressionError;
use crate::measurement::results::MeasurementError;
use crate::timeout::TimeoutError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerfmapError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// A contributor kept reporting available work, breaking the
    /// self-exhaustion contract.
    #[error("contribution loop did not reach a fixpoint within {limit} passes")]
    FixpointDiverged { limit: usize },

    #[error("judge state missing from the board after initialisation")]
    JudgeStateMissing,

    #[error("measurement tool failed: {0}")]
    MeasurementTool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
