//! Execution of vendor submissions against calculated tests.
//!
//! [`TestExecutor::execute`] extracts the reported results from a submitted
//! artifact, runs structural validation, compares the reported results with
//! the test's expected results and persists the outcome as an
//! [`Execution`].

mod error;


use std::sync::Arc;

use tracing::info;

pub use error::ExecuteError;

use crate::compare::{DiscrepancyRenderer, LegacyRenderer, compare_to_errors};
use crate::model::{CalculatedTest, Execution, ExecutionError, ExecutionId, ValidatorType};
use crate::ports::{
    ArtifactStore, ExecutionRepository, PortError, ResultExtractor, StructuralValidator,
    SubmittedArtifact,
};

/// Runs submissions against calculated tests.
pub struct TestExecutor<R = LegacyRenderer> {
    extractor: Arc<dyn ResultExtractor>,
    validator: Arc<dyn StructuralValidator>,
    artifacts: Arc<dyn ArtifactStore>,
    executions: Arc<dyn ExecutionRepository>,
    renderer: R,
}

impl TestExecutor {
    /// Creates an executor rendering discrepancies with [`LegacyRenderer`].
    #[must_use]
    pub fn new(
        extractor: Arc<dyn ResultExtractor>,
        validator: Arc<dyn StructuralValidator>,
        artifacts: Arc<dyn ArtifactStore>,
        executions: Arc<dyn ExecutionRepository>,
    ) -> Self {
        Self {
            extractor,
            validator,
            artifacts,
            executions,
            renderer: LegacyRenderer,
        }
    }
}

impl<R: DiscrepancyRenderer> TestExecutor<R> {
    /// Replaces the discrepancy renderer.
    #[must_use]
    pub fn with_renderer<T: DiscrepancyRenderer>(self, renderer: T) -> TestExecutor<T> {
        TestExecutor {
            extractor: self.extractor,
            validator: self.validator,
            artifacts: self.artifacts,
            executions: self.executions,
            renderer,
        }
    }

    /// Executes `artifact` against `test`.
    ///
    /// The execution records structural warnings first, then one error per
    /// measure whose reported results differ from the expected ones. It
    /// passes iff it holds no error-kind records. `compared_against` links
    /// earlier executions whose warnings should be shown alongside this
    /// one's.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::NotReady`] if the test has no expected
    /// results, [`ExecuteError::Extraction`] or [`ExecuteError::Validation`]
    /// if the artifact cannot be processed, and
    /// [`ExecuteError::Persistence`] if storage fails.
    pub fn execute(
        &self,
        test: &CalculatedTest,
        artifact: &SubmittedArtifact,
        compared_against: &[ExecutionId],
    ) -> Result<Execution, ExecuteError> {
        let expected = test.expected_results().ok_or_else(|| ExecuteError::NotReady {
            test_id: test.id().to_string(),
        })?;

        let reported = self
            .extractor
            .extract_results(&artifact.content)
            .map_err(|source| ExecuteError::Extraction {
                file_name: artifact.file_name.clone(),
                source,
            })?;
        let warnings = self
            .validator
            .validate(&artifact.content)
            .map_err(|source| ExecuteError::Validation {
                file_name: artifact.file_name.clone(),
                source,
            })?;

        let mut errors: Vec<ExecutionError> = warnings
            .into_iter()
            .map(|message| {
                ExecutionError::warning(message)
                    .with_validator(ValidatorType::Qrda)
                    .in_file(artifact.file_name.as_str())
            })
            .collect();
        errors.extend(compare_to_errors(expected, &reported, &self.renderer));

        let mut execution = Execution::new(
            format!("EXEC-{}", uuid::Uuid::new_v4()),
            test.id(),
            expected.clone(),
            reported,
            errors,
        );
        for id in compared_against {
            execution.compare_against(id.as_str());
        }
        let persistence = |source: PortError, execution: &Execution| ExecuteError::Persistence {
            execution_id: execution.id().to_string(),
            source,
        };

        self.executions
            .save(&execution)
            .map_err(|e| persistence(e, &execution))?;
        let file_ids = self
            .artifacts
            .save_artifacts(artifact, &execution)
            .map_err(|e| persistence(e, &execution))?;
        execution.set_file_ids(file_ids);
        let outcome = execution.classify();
        self.executions
            .save(&execution)
            .map_err(|e| persistence(e, &execution))?;

        info!(
            execution_id = %execution.id(),
            test_id = %test.id(),
            file_name = %artifact.file_name,
            errors = execution.error_count(),
            outcome = %outcome,
            "Execution completed"
        );
        Ok(execution)
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for TestExecutor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestExecutor")
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}
