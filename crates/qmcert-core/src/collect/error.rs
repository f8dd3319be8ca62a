//! Error collection error types.

use thiserror::Error;

use crate::ports::PortError;

/// Errors raised while collecting execution errors.
///
/// Apart from [`CollectError::FileNotFound`], these never escape
/// [`super::ErrorCollector::collect`]; they are captured as the fault of
/// an otherwise empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CollectError {
    /// A compared-against execution could not be loaded.
    #[error("failed to load compared-against execution {execution_id}: {source}")]
    Sibling {
        /// The missing execution.
        execution_id: String,
        /// Underlying repository error.
        #[source]
        source: PortError,
    },

    /// The artifact store could not serve the execution's files.
    #[error("failed to read artifact files: {source}")]
    Artifact {
        /// Underlying store error.
        #[source]
        source: PortError,
    },

    /// A stored file is not a well-formed XML document.
    #[error("file {file_name} is not a readable document: {reason}")]
    Document {
        /// The offending file.
        file_name: String,
        /// Parser message.
        reason: String,
    },

    /// No collected file matches the requested name.
    #[error("could not find results for file {file_name}")]
    FileNotFound {
        /// The requested name.
        file_name: String,
    },
}

impl CollectError {
    /// Creates a document error.
    #[must_use]
    pub fn document(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Document {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a file-not-found error.
    #[must_use]
    pub fn file_not_found(file_name: impl Into<String>) -> Self {
        Self::FileNotFound {
            file_name: file_name.into(),
        }
    }
}
