//! Lifecycle error types.

use thiserror::Error;

use crate::model::TestState;
use crate::ports::PortError;

/// Errors raised while driving a test through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// The requested transition is not valid from the current state.
    #[error("invalid transition for test {test_id}: {current} -> {target}")]
    InvalidTransition {
        /// Test id.
        test_id: String,
        /// Current state.
        current: TestState,
        /// Attempted target state.
        target: TestState,
    },

    /// The operation requires a different state.
    #[error("test {test_id} is {state}, expected {expected}")]
    UnexpectedState {
        /// Test id.
        test_id: String,
        /// Current state.
        state: TestState,
        /// State the operation requires.
        expected: TestState,
    },

    /// The test changed since it was read.
    #[error("test {test_id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        /// Test id.
        test_id: String,
        /// Version the lifecycle read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Population selection failed.
    #[error("population selection failed for test {test_id}: {source}")]
    Population {
        /// Test id.
        test_id: String,
        /// Underlying collaborator error.
        #[source]
        source: PortError,
    },

    /// The population clone job failed; the test was rolled back.
    #[error("population clone failed for test {test_id}: {source}")]
    Clone {
        /// Test id.
        test_id: String,
        /// Underlying collaborator error.
        #[source]
        source: PortError,
    },

    /// The evaluation queue rejected the request.
    #[error("evaluation dispatch failed for test {test_id}: {source}")]
    Dispatch {
        /// Test id.
        test_id: String,
        /// Underlying collaborator error.
        #[source]
        source: PortError,
    },

    /// The test targets a measure that is not eligible for calculated
    /// tests.
    #[error("measure {measure_id} is not eligible for test {test_id}")]
    IneligibleMeasure {
        /// Test id.
        test_id: String,
        /// The offending measure.
        measure_id: String,
    },

    /// A failed step could not be rolled back.
    #[error("{cause}; rolling test {test_id} back failed: {rollback}")]
    Rollback {
        /// Test id.
        test_id: String,
        /// The failure that triggered the rollback.
        #[source]
        cause: Box<LifecycleError>,
        /// Why the rollback itself failed.
        rollback: Box<LifecycleError>,
    },

    /// The test repository failed.
    #[error("test repository error: {0}")]
    Repository(#[from] PortError),
}

impl LifecycleError {
    /// Creates an invalid transition error.
    #[must_use]
    pub fn invalid_transition(
        test_id: impl Into<String>,
        current: TestState,
        target: TestState,
    ) -> Self {
        Self::InvalidTransition {
            test_id: test_id.into(),
            current,
            target,
        }
    }

    /// Returns `true` if retrying after reloading the test may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
