//! Executions and the error records attached to them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ExecutionId, FileId, MeasureId, ResultsMap, TestId};

/// Severity of an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    /// Fails the execution.
    Error,
    /// Informational; never affects the outcome.
    Warning,
}

impl MsgType {
    /// Returns the severity as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The validation stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorType {
    /// Structural schema or schematron violations.
    #[default]
    Qrda,
    /// Semantic mismatch against expected results.
    Reporting,
    /// Transport or file-format problems.
    Submission,
}

/// Display category of an execution error.
///
/// Own errors fall into `Qrda`, `Reporting` or `Submission` by validator.
/// Warnings pulled from compared-against executions fall into `CmsWarning`
/// or `NonCmsWarning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Structural schema violations.
    Qrda,
    /// Result comparison discrepancies.
    Reporting,
    /// Transport and format issues.
    Submission,
    /// CMS-flagged warnings from a compared-against execution.
    CmsWarning,
    /// Remaining warnings from a compared-against execution.
    NonCmsWarning,
}

impl ErrorCategory {
    /// All categories in display order.
    pub const ALL: [Self; 5] = [
        Self::Qrda,
        Self::Reporting,
        Self::Submission,
        Self::CmsWarning,
        Self::NonCmsWarning,
    ];

    /// Returns the heading used when presenting the category.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Qrda => "QRDA",
            Self::Reporting => "Reporting",
            Self::Submission => "Submission",
            Self::CmsWarning => "CMS Warnings",
            Self::NonCmsWarning => "Other Warnings",
        }
    }

    /// Returns `true` for categories sourced from compared-against
    /// executions.
    #[must_use]
    pub const fn is_related(&self) -> bool {
        matches!(self, Self::CmsWarning | Self::NonCmsWarning)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single problem found while executing a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    message: String,
    msg_type: MsgType,
    #[serde(default)]
    validator: ValidatorType,
    #[serde(default)]
    cms: bool,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    measure_id: Option<MeasureId>,
}

impl ExecutionError {
    /// Creates an error-kind record.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, MsgType::Error)
    }

    /// Creates a warning-kind record.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, MsgType::Warning)
    }

    fn new(message: impl Into<String>, msg_type: MsgType) -> Self {
        Self {
            message: message.into(),
            msg_type,
            validator: ValidatorType::default(),
            cms: false,
            file_name: None,
            location: None,
            measure_id: None,
        }
    }

    /// Sets the validator that produced this record.
    #[must_use]
    pub fn with_validator(mut self, validator: ValidatorType) -> Self {
        self.validator = validator;
        self
    }

    /// Marks this record as CMS-flagged.
    #[must_use]
    pub fn with_cms(mut self, cms: bool) -> Self {
        self.cms = cms;
        self
    }

    /// Attaches the originating artifact file.
    #[must_use]
    pub fn in_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Attaches the location of the offending node inside the file.
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Attaches the measure this record pertains to.
    #[must_use]
    pub fn with_measure_id(mut self, measure_id: impl Into<MeasureId>) -> Self {
        self.measure_id = Some(measure_id.into());
        self
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the severity.
    #[must_use]
    pub const fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    /// Returns the validator that produced this record.
    #[must_use]
    pub const fn validator(&self) -> ValidatorType {
        self.validator
    }

    /// Returns `true` if this record is CMS-flagged.
    #[must_use]
    pub const fn is_cms(&self) -> bool {
        self.cms
    }

    /// Returns the originating artifact file, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the XPath-style location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns the measure id, if any.
    #[must_use]
    pub fn measure_id(&self) -> Option<&str> {
        self.measure_id.as_deref()
    }

    /// Returns `true` if this record fails an execution.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.msg_type, MsgType::Error)
    }

    /// Returns `true` if this record belongs to `category`.
    #[must_use]
    pub const fn is_in(&self, category: ErrorCategory) -> bool {
        match category {
            ErrorCategory::Qrda => matches!(self.validator, ValidatorType::Qrda),
            ErrorCategory::Reporting => matches!(self.validator, ValidatorType::Reporting),
            ErrorCategory::Submission => matches!(self.validator, ValidatorType::Submission),
            ErrorCategory::CmsWarning => matches!(self.msg_type, MsgType::Warning) && self.cms,
            ErrorCategory::NonCmsWarning => matches!(self.msg_type, MsgType::Warning) && !self.cms,
        }
    }
}

/// Terminal classification of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Not yet classified.
    #[default]
    Pending,
    /// No error-kind records.
    Passed,
    /// At least one error-kind record.
    Failed,
}

impl ExecutionOutcome {
    /// Returns the outcome as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to validate a submitted artifact against a test.
///
/// The expected results are a snapshot taken when the execution is built;
/// later changes to the owning test never reach an existing execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    id: ExecutionId,
    test_id: TestId,
    expected_results: ResultsMap,
    reported_results: ResultsMap,
    execution_errors: Vec<ExecutionError>,
    file_ids: Vec<FileId>,
    outcome: ExecutionOutcome,
    compared_against: Vec<ExecutionId>,
}

impl Execution {
    /// Creates a pending execution.
    #[must_use]
    pub fn new(
        id: impl Into<ExecutionId>,
        test_id: impl Into<TestId>,
        expected_results: ResultsMap,
        reported_results: ResultsMap,
        execution_errors: Vec<ExecutionError>,
    ) -> Self {
        Self {
            id: id.into(),
            test_id: test_id.into(),
            expected_results,
            reported_results,
            execution_errors,
            file_ids: Vec::new(),
            outcome: ExecutionOutcome::Pending,
            compared_against: Vec::new(),
        }
    }

    /// Returns the execution ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the owning test ID.
    #[must_use]
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Returns the expected results snapshot.
    #[must_use]
    pub const fn expected_results(&self) -> &ResultsMap {
        &self.expected_results
    }

    /// Returns the results reported by the submission.
    #[must_use]
    pub const fn reported_results(&self) -> &ResultsMap {
        &self.reported_results
    }

    /// Returns the error records in the order they were found.
    #[must_use]
    pub fn execution_errors(&self) -> &[ExecutionError] {
        &self.execution_errors
    }

    /// Returns the stored artifact file ids.
    #[must_use]
    pub fn file_ids(&self) -> &[FileId] {
        &self.file_ids
    }

    /// Returns the outcome.
    #[must_use]
    pub const fn outcome(&self) -> ExecutionOutcome {
        self.outcome
    }

    /// Returns the executions this one is compared against.
    #[must_use]
    pub fn compared_against(&self) -> &[ExecutionId] {
        &self.compared_against
    }

    /// Returns the number of error-kind records.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.execution_errors.iter().filter(|e| e.is_error()).count()
    }

    /// Returns `true` if the execution passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Passed)
    }

    /// Returns the records originating from `file_name`; `None` selects
    /// records with no originating file.
    pub fn errors_in_file<'a>(
        &'a self,
        file_name: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ExecutionError> + 'a {
        self.execution_errors
            .iter()
            .filter(move |e| e.file_name() == file_name)
    }

    /// Attaches stored artifact file ids.
    pub fn set_file_ids(&mut self, file_ids: Vec<FileId>) {
        self.file_ids = file_ids;
    }

    /// Adds a compared-against execution. Duplicates are ignored.
    pub fn compare_against(&mut self, execution_id: impl Into<ExecutionId>) {
        let execution_id = execution_id.into();
        if execution_id != self.id && !self.compared_against.contains(&execution_id) {
            self.compared_against.push(execution_id);
        }
    }

    /// Classifies the execution: passed iff there are no error-kind records.
    pub fn classify(&mut self) -> ExecutionOutcome {
        self.outcome = if self.error_count() == 0 {
            ExecutionOutcome::Passed
        } else {
            ExecutionOutcome::Failed
        };
        self.outcome
    }
}
