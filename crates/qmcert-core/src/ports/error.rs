//! Collaborator error types.

use thiserror::Error;

/// Errors reported by collaborators behind the port traits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PortError {
    /// The requested record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind (e.g. "test", "execution", "file").
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The stored record changed since it was read.
    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        /// Record id.
        id: String,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The input document could not be parsed.
    #[error("parse failed: {reason}")]
    Parse {
        /// Why parsing failed.
        reason: String,
    },

    /// The collaborator refused the request.
    #[error("{collaborator} rejected the request: {reason}")]
    Rejected {
        /// Collaborator name.
        collaborator: &'static str,
        /// Why the request was refused.
        reason: String,
    },

    /// The collaborator is not reachable or its state is unusable.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        /// Collaborator name.
        collaborator: &'static str,
        /// Why it is unavailable.
        reason: String,
    },
}

impl PortError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates a version conflict error.
    #[must_use]
    pub fn conflict(id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            collaborator,
            reason: reason.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error is a version conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if the error is a missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
