//! Measure descriptors.

use serde::{Deserialize, Serialize};

use super::MeasureId;

/// Reporting program a measure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    /// Eligible professional (clinician) measure.
    Ep,
    /// Eligible hospital measure.
    Eh,
}

/// A clinical quality measure from a measure bundle.
///
/// Measures with several population sets share an `hqmf_id` and are told
/// apart by `sub_id`; the first population set has no `sub_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    /// Measure id.
    pub id: MeasureId,
    /// HQMF identifier shared by all population sets of the measure.
    pub hqmf_id: String,
    /// Reporting program.
    pub kind: MeasureKind,
    /// Population set suffix (`"b"`, `"c"`, ...).
    #[serde(default)]
    pub sub_id: Option<String>,
}

impl Measure {
    /// Returns `true` for the first population set of a measure.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.sub_id.is_none()
    }
}

/// Returns the measures a calculated test may target: top-level `ep`
/// measures, in catalog order.
pub fn eligible_measures(catalog: &[Measure]) -> impl Iterator<Item = &Measure> {
    catalog
        .iter()
        .filter(|m| m.kind == MeasureKind::Ep && m.is_top_level())
}
