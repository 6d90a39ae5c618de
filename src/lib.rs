//! Automated extraction of performance models from measured program
//! behaviour.
//!
//! The crate revolves around a blackboard: measurable elements of a program
//! are seeded as open questions, measurement tools feed observed facts onto
//! the board, and a set of stateless contributors propose and refine
//! candidate expressions until a judge declares the run finished.

pub mod analysis;
pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod expression;
pub mod fitness;
pub mod io;
pub mod judge;
pub mod measurement;
pub mod output;
pub mod stats;
pub mod timeout;

pub use analysis::{AnalysisController, BoardContributor, MeasurementTool, RunOutcome, RunSummary};
pub use board::{Board, BoardError, BoardParticipant, ReadOnlyView, ReadWriteView};
pub use errors::PerfmapError;
pub use expression::{ExprRef, Expression, ExpressionError};
pub use judge::{FinalJudge, StopReason};
pub use measurement::{CodeSection, MeasurableElement};
