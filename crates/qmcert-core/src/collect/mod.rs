//! Per-execution error aggregation for display.
//!
//! [`ErrorCollector::collect`] gathers everything a report needs about one
//! execution:
//!
//! - messages of errors not tied to a file, merged with those of the
//!   compared-against executions and deduplicated in first-seen order;
//! - one [`FileErrorGroup`] per artifact file that has errors, split into
//!   the [`ErrorCategory`] buckets and correlated with the file's document.
//!
//! Own errors fill the `QRDA`, `Reporting` and `Submission` buckets. Errors
//! of compared-against executions for the same file fill only the
//! `CMS Warnings` and `Other Warnings` buckets.
//!
//! Collection degrades instead of failing: any fault yields an empty result
//! with the fault attached, and a warning is logged.

mod error;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

pub use error::CollectError;

use crate::config::CorrelationConfig;
use crate::correlate::{Correlation, Correlator, ErrorIdAssignments, parse_document};
use crate::model::{ErrorCategory, Execution, ExecutionError};
use crate::ports::{ArtifactStore, ExecutionRepository};

/// Errors of one category within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBucket {
    /// Bucket category.
    pub category: ErrorCategory,
    /// Errors in the bucket, in execution order.
    pub errors: Vec<ExecutionError>,
    /// Location correlation for the bucket's errors; empty for placeholders.
    pub correlation: Correlation,
}

impl ErrorBucket {
    /// Returns `true` if the bucket holds no errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// All errors reported against one artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileErrorGroup {
    /// Artifact file name.
    pub file_name: String,
    /// One bucket per category, in [`ErrorCategory::ALL`] order.
    pub buckets: Vec<ErrorBucket>,
    /// The document text with assigned identifiers written as attributes;
    /// `None` when no location was correlated.
    pub annotated_document: Option<String>,
}

impl FileErrorGroup {
    /// Returns the bucket for `category`.
    #[must_use]
    pub fn bucket(&self, category: ErrorCategory) -> Option<&ErrorBucket> {
        self.buckets.iter().find(|b| b.category == category)
    }

    /// Returns the number of errors across all buckets.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.buckets.iter().map(|b| b.errors.len()).sum()
    }
}

/// Collected errors of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectedErrors {
    /// Messages of errors without an originating file.
    pub non_file: Vec<String>,
    /// Files with at least one error, in artifact order.
    pub files: Vec<FileErrorGroup>,
    /// The fault that emptied this result, if any.
    #[serde(serialize_with = "serialize_fault", skip_serializing_if = "Option::is_none")]
    pub fault: Option<CollectError>,
}

impl CollectedErrors {
    fn faulted(fault: CollectError) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    /// Returns the group for an exact file name.
    #[must_use]
    pub fn file(&self, file_name: &str) -> Option<&FileErrorGroup> {
        self.files.iter().find(|f| f.file_name == file_name)
    }

    /// Returns `true` if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.non_file.is_empty() && self.files.is_empty()
    }
}

fn serialize_fault<S: Serializer>(
    fault: &Option<CollectError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match fault {
        Some(fault) => serializer.collect_str(fault),
        None => serializer.serialize_none(),
    }
}

/// Encodes a file name for use as a route segment.
#[must_use]
pub fn route_file_name(file_name: &str) -> String {
    file_name.replace('.', "_")
}

/// Finds the collected group whose route-encoded name matches the
/// route-encoded `file_name`.
///
/// # Errors
///
/// Returns [`CollectError::FileNotFound`] if no file matches.
pub fn file_error_group<'a>(
    collected: &'a CollectedErrors,
    file_name: &str,
) -> Result<&'a FileErrorGroup, CollectError> {
    let target = route_file_name(file_name);
    collected
        .files
        .iter()
        .find(|f| route_file_name(&f.file_name) == target)
        .ok_or_else(|| CollectError::file_not_found(file_name))
}

/// Aggregates execution errors for display.
pub struct ErrorCollector {
    executions: Arc<dyn ExecutionRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    correlator: Correlator,
}

impl ErrorCollector {
    /// Creates a collector reading siblings from `executions` and documents
    /// from `artifacts`.
    #[must_use]
    pub fn new(
        executions: Arc<dyn ExecutionRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        config: &CorrelationConfig,
    ) -> Self {
        Self {
            executions,
            artifacts,
            correlator: Correlator::new(config),
        }
    }

    /// Collects the errors of `execution`.
    ///
    /// Never fails: on any fault the result is empty and carries the fault.
    #[must_use]
    pub fn collect(&self, execution: &Execution) -> CollectedErrors {
        match self.try_collect(execution) {
            Ok(collected) => collected,
            Err(fault) => {
                warn!(
                    execution_id = %execution.id(),
                    error = %fault,
                    "Error collection failed, returning empty result"
                );
                CollectedErrors::faulted(fault)
            },
        }
    }

    fn try_collect(&self, execution: &Execution) -> Result<CollectedErrors, CollectError> {
        let siblings = execution
            .compared_against()
            .iter()
            .map(|id| {
                self.executions.get(id).map_err(|source| CollectError::Sibling {
                    execution_id: id.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        let non_file = execution
            .errors_in_file(None)
            .chain(siblings.iter().flat_map(|s| s.errors_in_file(None)))
            .map(ExecutionError::message)
            .filter(|message| seen.insert(*message))
            .map(str::to_string)
            .collect();

        let file_names = if execution.file_ids().is_empty() {
            Vec::new()
        } else {
            self.artifacts
                .file_names(execution.file_ids())
                .map_err(|source| CollectError::Artifact { source })?
        };

        let mut files = Vec::new();
        for file_name in file_names {
            let own: Vec<&ExecutionError> = execution
                .errors_in_file(Some(file_name.as_str()))
                .collect();
            let related: Vec<&ExecutionError> = siblings
                .iter()
                .flat_map(|s| s.errors_in_file(Some(file_name.as_str())))
                .collect();
            if own.is_empty() && related.is_empty() {
                continue;
            }
            files.push(self.file_group(execution, &file_name, &own, &related)?);
        }

        debug!(
            execution_id = %execution.id(),
            siblings = siblings.len(),
            files = files.len(),
            "Collected execution errors"
        );
        Ok(CollectedErrors {
            non_file,
            files,
            fault: None,
        })
    }

    fn file_group(
        &self,
        execution: &Execution,
        file_name: &str,
        own: &[&ExecutionError],
        related: &[&ExecutionError],
    ) -> Result<FileErrorGroup, CollectError> {
        // Empty buckets stay as placeholders with no correlation.
        let mut buckets: Vec<ErrorBucket> = ErrorCategory::ALL
            .iter()
            .map(|&category| {
                let source = if category.is_related() { related } else { own };
                ErrorBucket {
                    category,
                    errors: source
                        .iter()
                        .filter(|e| e.is_in(category))
                        .map(|e| (*e).clone())
                        .collect(),
                    correlation: Correlation::default(),
                }
            })
            .collect();

        if buckets.iter().all(ErrorBucket::is_empty) {
            return Ok(FileErrorGroup {
                file_name: file_name.to_string(),
                buckets,
                annotated_document: None,
            });
        }

        let content = self
            .artifacts
            .read_file(execution.file_ids(), file_name)
            .map_err(|source| CollectError::Artifact { source })?;
        let text = std::str::from_utf8(&content)
            .map_err(|e| CollectError::document(file_name, e.to_string()))?;
        let document = parse_document(text)
            .map_err(|e| CollectError::document(file_name, e.to_string()))?;

        let mut assignments = ErrorIdAssignments::new();
        for bucket in buckets.iter_mut().filter(|b| !b.is_empty()) {
            bucket.correlation = self
                .correlator
                .correlate(&document, &bucket.errors, &mut assignments);
        }

        let annotated_document = (!assignments.is_empty())
            .then(|| assignments.annotate(&document, self.correlator.error_id_attribute()));

        Ok(FileErrorGroup {
            file_name: file_name.to_string(),
            buckets,
            annotated_document,
        })
    }
}

impl std::fmt::Debug for ErrorCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCollector")
            .field("correlator", &self.correlator)
            .finish_non_exhaustive()
    }
}
