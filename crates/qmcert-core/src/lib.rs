//! # qmcert-core
//!
//! Test execution and error correlation for clinical-quality-measure
//! certification.
//!
//! Vendors submit patient-data exports (QRDA documents) against calculated
//! tests. This crate drives a test from creation to readiness, executes
//! submissions against it, and turns everything found along the way into
//! structured, location-anchored errors:
//!
//! - [`lifecycle`]: population selection, cloning and evaluation dispatch
//!   for a [`CalculatedTest`]
//! - [`execute`]: extraction, validation and comparison of a submission,
//!   persisted as an [`Execution`]
//! - [`compare`]: expected-versus-reported result diffing
//! - [`correlate`]: resolution of error locations to stable document node
//!   identifiers
//! - [`collect`]: per-file, per-category aggregation of an execution's
//!   errors for display
//!
//! Storage, population cloning, measure evaluation and QRDA parsing are
//! collaborators behind the traits in [`ports`].
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use qmcert_core::compare::{LegacyRenderer, compare_to_errors};
//! use qmcert_core::{ResultValue, ResultsMap};
//!
//! let expected: ResultsMap = BTreeMap::from([(
//!     "measureA".to_string(),
//!     BTreeMap::from([("numerator".to_string(), ResultValue::Integer(5))]),
//! )]);
//! let reported: ResultsMap = BTreeMap::from([(
//!     "measureA".to_string(),
//!     BTreeMap::from([("numerator".to_string(), ResultValue::Integer(3))]),
//! )]);
//!
//! let errors = compare_to_errors(&expected, &reported, &LegacyRenderer);
//! assert_eq!(errors.len(), 1);
//! assert_eq!(
//!     errors[0].message(),
//!     "expected numerator value 5 does not match reported value 3"
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collect;
pub mod compare;
pub mod config;
pub mod correlate;
pub mod execute;
pub mod lifecycle;
pub mod model;
pub mod ports;

// Re-export main types at crate root for convenience
pub use collect::{CollectError, CollectedErrors, ErrorCollector, FileErrorGroup};
pub use compare::{Discrepancy, DiscrepancyRenderer, LegacyRenderer, MeasureDiscrepancies};
pub use config::{CertConfig, ConfigError};
pub use correlate::{Correlation, Correlator, ErrorIdAssignments};
pub use execute::{ExecuteError, TestExecutor};
pub use lifecycle::{LifecycleError, TestLifecycle};
pub use model::{
    CalculatedTest, ErrorCategory, Execution, ExecutionError, ExecutionOutcome, MsgType,
    ResultValue, ResultsMap, TestState, ValidatorType,
};
pub use ports::PortError;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::collect::{ErrorCollector, file_error_group, route_file_name};
    pub use crate::compare::{compare, compare_to_errors};
    pub use crate::config::CertConfig;
    pub use crate::correlate::{Correlator, ErrorIdAssignments, parse_document};
    pub use crate::execute::TestExecutor;
    pub use crate::lifecycle::TestLifecycle;
    pub use crate::model::{CalculatedTest, Execution, ExecutionError, ResultValue, ResultsMap};
    pub use crate::ports::{
        ArtifactStore, EvaluationQueue, ExecutionRepository, PopulationCloneJob,
        PopulationSelector, ResultExtractor, StructuralValidator, SubmittedArtifact,
        TestRepository,
    };
}
