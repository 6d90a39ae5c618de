//! Immutable measurement facts and their validation.

use crate::expression::Assignment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The resource a demand measurement is accounted against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Cpu,
    Hdd,
    Network,
    Other(String),
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Cpu => f.write_str("cpu"),
            ResourceType::Hdd => f.write_str("hdd"),
            ResourceType::Network => f.write_str("network"),
            ResourceType::Other(name) => f.write_str(name),
        }
    }
}

/// Contract violations in measurement-fact construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeasurementError {
    #[error("{fact} must be non-negative and finite, got {value}")]
    InvalidValue { fact: &'static str, value: f64 },
}

/// Snapshot of named variable state at measurement time.
///
/// Wrapped rather than a bare map so that "no parameterisation recorded"
/// (`Option::None` on the result) stays distinct from an empty snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameterisation(BTreeMap<String, f64>);

impl Parameterisation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The snapshot as a variable assignment for expression evaluation.
    pub fn as_assignment(&self) -> Assignment {
        self.0.clone()
    }
}

impl FromIterator<(String, f64)> for Parameterisation {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The measured fact itself, one variant per measurable-element kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum MeasuredValue {
    ResourceDemand { value: f64, resource: ResourceType },
    BranchDecision { index: usize },
    LoopRepetition { count: u64 },
    ParameterValue { value: String },
}

/// An immutable measurement fact, optionally tagged with the variable
/// state observed when it was taken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub value: MeasuredValue,
    pub parameterisation: Option<Parameterisation>,
}

impl MeasurementResult {
    /// A resource-demand fact; the demand must be non-negative and finite.
    pub fn resource_demand(
        value: f64,
        resource: ResourceType,
    ) -> Result<Self, MeasurementError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MeasurementError::InvalidValue {
                fact: "resource demand",
                value,
            });
        }
        Ok(Self {
            value: MeasuredValue::ResourceDemand { value, resource },
            parameterisation: None,
        })
    }

    pub fn branch_decision(index: usize) -> Self {
        Self {
            value: MeasuredValue::BranchDecision { index },
            parameterisation: None,
        }
    }

    pub fn loop_repetition(count: u64) -> Self {
        Self {
            value: MeasuredValue::LoopRepetition { count },
            parameterisation: None,
        }
    }

    pub fn parameter_value(value: impl Into<String>) -> Self {
        Self {
            value: MeasuredValue::ParameterValue {
                value: value.into(),
            },
            parameterisation: None,
        }
    }

    pub fn with_parameterisation(mut self, parameterisation: Option<Parameterisation>) -> Self {
        self.parameterisation = parameterisation;
        self
    }

    /// The fact as a number, for fitness grading and statistics.
    ///
    /// Parameter values that do not parse as finite numbers have no numeric
    /// reading and yield `None`; `"NaN"` and `"inf"` parse but would poison
    /// every downstream mean and fit, so they are treated as non-numeric too.
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            MeasuredValue::ResourceDemand { value, .. } => Some(*value),
            MeasuredValue::BranchDecision { index } => Some(*index as f64),
            MeasuredValue::LoopRepetition { count } => Some(*count as f64),
            MeasuredValue::ParameterValue { value } => {
                value.parse().ok().filter(|parsed: &f64| parsed.is_finite())
            }
        }
    }
}
