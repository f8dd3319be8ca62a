//! Expected-versus-reported result comparison.
//!
//! Comparison is driven by the expected results: every component of every
//! expected measure is checked against the reported value, and measures the
//! submission reports beyond the expected set are ignored. Differences are
//! kept as structured [`Discrepancy`] records and only turned into text by a
//! [`DiscrepancyRenderer`] when they become [`ExecutionError`]s.
//!
//! # Invariants
//!
//! - At most one [`MeasureDiscrepancies`] group, and so at most one error,
//!   per expected measure.
//! - A group is never empty.
//! - Value equality is exact on the typed value; there is no numeric
//!   tolerance and no case folding.


use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{
    ComponentResults, ExecutionError, MeasureId, ResultValue, ResultsMap, ValidatorType,
};

/// Separator used by [`LegacyRenderer`] between component messages.
pub const LEGACY_SEPARATOR: &str = ",  ";

/// One component whose reported value differs from the expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Measure the component belongs to.
    pub measure_id: MeasureId,
    /// Component name (e.g. `numerator`).
    pub component: String,
    /// Expected value.
    pub expected: ResultValue,
    /// Reported value; `None` when the submission omitted the component.
    pub actual: Option<ResultValue>,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} value {} does not match reported value ",
            self.component, self.expected
        )?;
        match &self.actual {
            Some(actual) => write!(f, "{actual}"),
            None => Ok(()),
        }
    }
}

/// All discrepancies found for one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureDiscrepancies {
    /// Measure id.
    pub measure_id: MeasureId,
    /// Differing components, in component order.
    pub discrepancies: Vec<Discrepancy>,
}

impl MeasureDiscrepancies {
    /// Returns the names of the differing components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.discrepancies.iter().map(|d| d.component.as_str())
    }
}

/// Renders a measure's discrepancies into an error message.
pub trait DiscrepancyRenderer {
    /// Returns the message for one measure.
    fn render(&self, group: &MeasureDiscrepancies) -> String;
}

/// Renders every component message joined by [`LEGACY_SEPARATOR`], matching
/// the message format earlier certification reports used.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyRenderer;

impl DiscrepancyRenderer for LegacyRenderer {
    fn render(&self, group: &MeasureDiscrepancies) -> String {
        group
            .discrepancies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(LEGACY_SEPARATOR)
    }
}

/// Compares one measure's components.
fn compare_measure(
    measure_id: &str,
    expected: &ComponentResults,
    reported: Option<&ComponentResults>,
) -> Vec<Discrepancy> {
    expected
        .iter()
        .filter_map(|(component, expected_value)| {
            let actual = reported.and_then(|r| r.get(component));
            if actual == Some(expected_value) {
                return None;
            }
            Some(Discrepancy {
                measure_id: measure_id.to_string(),
                component: component.clone(),
                expected: expected_value.clone(),
                actual: actual.cloned(),
            })
        })
        .collect()
}

/// Compares reported results against expected results.
///
/// Returns one group per expected measure with at least one differing or
/// missing component, in measure-id order.
#[must_use]
pub fn compare(expected: &ResultsMap, reported: &ResultsMap) -> Vec<MeasureDiscrepancies> {
    expected
        .iter()
        .filter_map(|(measure_id, components)| {
            let discrepancies = compare_measure(measure_id, components, reported.get(measure_id));
            (!discrepancies.is_empty()).then(|| MeasureDiscrepancies {
                measure_id: measure_id.clone(),
                discrepancies,
            })
        })
        .collect()
}

/// Compares results and renders each affected measure into one error-kind
/// [`ExecutionError`] carrying the measure id.
#[must_use]
pub fn compare_to_errors(
    expected: &ResultsMap,
    reported: &ResultsMap,
    renderer: &impl DiscrepancyRenderer,
) -> Vec<ExecutionError> {
    compare(expected, reported)
        .iter()
        .map(|group| {
            ExecutionError::error(renderer.render(group))
                .with_validator(ValidatorType::Reporting)
                .with_measure_id(group.measure_id.clone())
        })
        .collect()
}
