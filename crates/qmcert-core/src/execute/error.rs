//! Execution error types.

use thiserror::Error;

use crate::ports::PortError;

/// Errors raised while executing a submission.
///
/// Comparison discrepancies and validation warnings are data recorded on
/// the execution, not errors of this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ExecuteError {
    /// The test has no expected results yet.
    #[error("test {test_id} is not ready for execution")]
    NotReady {
        /// Test id.
        test_id: String,
    },

    /// Reported results could not be extracted from the artifact.
    #[error("failed to extract results from {file_name}: {source}")]
    Extraction {
        /// Artifact file name.
        file_name: String,
        /// Underlying extractor error.
        #[source]
        source: PortError,
    },

    /// The structural validator could not run.
    #[error("failed to validate {file_name}: {source}")]
    Validation {
        /// Artifact file name.
        file_name: String,
        /// Underlying validator error.
        #[source]
        source: PortError,
    },

    /// The execution or its artifact could not be stored.
    #[error("failed to persist execution {execution_id}: {source}")]
    Persistence {
        /// Execution id.
        execution_id: String,
        /// Underlying storage error.
        #[source]
        source: PortError,
    },
}
