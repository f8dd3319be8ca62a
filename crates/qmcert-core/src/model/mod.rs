//! Domain model for certification tests and their executions.
//!
//! A [`CalculatedTest`] owns the expected measure results computed from a
//! reference population. Each vendor submission against it produces an
//! [`Execution`] carrying a snapshot of those expected results, the results
//! reported by the vendor, and the [`ExecutionError`] records found while
//! checking the submission.

mod execution;
mod measure;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use calculated_test::{CalculatedTest, TestState};
pub use execution::{
    ErrorCategory, Execution, ExecutionError, ExecutionOutcome, MsgType, ValidatorType,
};
pub use measure::{Measure, MeasureKind, eligible_measures};

/// Identifier of a certification test.
pub type TestId = String;

/// Identifier of an execution.
pub type ExecutionId = String;

/// Identifier of a clinical quality measure.
pub type MeasureId = String;

/// Identifier of a patient record in the reference population.
pub type PatientId = String;

/// Identifier of a stored artifact file.
pub type FileId = String;

/// Result components of one measure (e.g. `numerator`, `denominator`).
pub type ComponentResults = BTreeMap<String, ResultValue>;

/// Measure results keyed by measure id.
pub type ResultsMap = BTreeMap<MeasureId, ComponentResults>;

/// A scalar result value as typed by the extractor.
///
/// Equality is exact on the typed value: `Integer(5)` and `Float(5.0)` are
/// different values, and text is compared without case folding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    /// Whole-number result (population counts).
    Integer(i64),
    /// Fractional result (performance rates, observations).
    Float(f64),
    /// Boolean result.
    Boolean(bool),
    /// Textual result.
    Text(String),
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i32> for ResultValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for ResultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ResultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ResultValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for ResultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ResultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
