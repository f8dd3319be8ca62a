//! Calculated test lifecycle.
//!
//! A new test runs through an explicit sequence of steps, each of which
//! persists its state before the next one starts:
//!
//! ```text
//! create -> generate_population -> calculate -> (evaluation job) -> record_expected_results
//! ```
//!
//! Every persisted save is a compare-and-swap on the test version, so a
//! concurrent modification surfaces as [`LifecycleError::Conflict`] rather
//! than being silently overwritten. Each step checks the source state before
//! running side effects, which keeps a side effect to at most one run per
//! transition.
//!
//! A transition is persisted before its side effect runs, so of several
//! callers racing on the same test only the one whose save wins runs it.
//!
//! Population cloning is synchronous. When it fails the test is rolled back
//! to `pending` and the failure is returned; a test is never left in
//! `generating_records` without a population. A rejected evaluation
//! dispatch rolls back to `generating_records`. Failures of the evaluation
//! job itself never roll state back.

mod error;


use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{info, warn};

pub use error::LifecycleError;

use crate::config::CertConfig;
use crate::model::{CalculatedTest, Measure, PatientId, ResultsMap, TestState, eligible_measures};
use crate::ports::{
    CloneRequest, Coverage, EvaluationQueue, EvaluationRequest, PopulationCloneJob,
    PopulationSelector, PortError, TestRepository,
};

/// Drives calculated tests from creation to readiness.
pub struct TestLifecycle {
    tests: Arc<dyn TestRepository>,
    selector: Arc<dyn PopulationSelector>,
    clone_job: Arc<dyn PopulationCloneJob>,
    queue: Arc<dyn EvaluationQueue>,
    config: CertConfig,
    catalog: Option<Vec<Measure>>,
}

impl TestLifecycle {
    /// Creates a lifecycle over the given collaborators.
    #[must_use]
    pub fn new(
        tests: Arc<dyn TestRepository>,
        selector: Arc<dyn PopulationSelector>,
        clone_job: Arc<dyn PopulationCloneJob>,
        queue: Arc<dyn EvaluationQueue>,
        config: CertConfig,
    ) -> Self {
        Self {
            tests,
            selector,
            clone_job,
            queue,
            config,
            catalog: None,
        }
    }

    /// Restricts new tests to the eligible measures of `catalog`.
    #[must_use]
    pub fn with_measure_catalog(mut self, catalog: Vec<Measure>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Persists a new test and immediately generates its population.
    ///
    /// Returns the test as persisted after the last completed step.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::IneligibleMeasure`] if a measure catalog is
    /// set and the test targets a measure outside its eligible measures.
    /// Otherwise returns an error if the test cannot be stored or
    /// population generation fails; in the latter case the stored test is
    /// `pending`.
    pub fn create(&self, test: CalculatedTest) -> Result<CalculatedTest, LifecycleError> {
        if let Some(catalog) = &self.catalog {
            let ineligible = test
                .measure_ids()
                .iter()
                .find(|id| !eligible_measures(catalog).any(|m| &m.id == *id));
            if let Some(measure_id) = ineligible {
                return Err(LifecycleError::IneligibleMeasure {
                    test_id: test.id().to_string(),
                    measure_id: measure_id.clone(),
                });
            }
        }

        self.tests.insert(&test)?;
        info!(
            test_id = %test.id(),
            measures = test.measure_ids().len(),
            bundle_version = %test.bundle_version(),
            "Calculated test created"
        );
        self.generate_population(test.id())
    }

    /// Selects and clones the test's population, then dispatches
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] unless the test is
    /// `pending`, [`LifecycleError::Population`] or
    /// [`LifecycleError::Clone`] on collaborator failure, and
    /// [`LifecycleError::Conflict`] on concurrent modification.
    pub fn generate_population(&self, test_id: &str) -> Result<CalculatedTest, LifecycleError> {
        let mut test = self.tests.get(test_id)?;
        ensure_transition(&test, TestState::Pending, TestState::GeneratingRecords)?;

        let coverage = self
            .selector
            .min_coverage(test.measure_ids())
            .map_err(|source| LifecycleError::Population {
                test_id: test_id.to_string(),
                source,
            })?;
        let patient_ids = self.with_overflow_sample(coverage);

        let expected = test.version();
        test.transition_to(TestState::GeneratingRecords)?;
        self.save(&test, expected)?;

        let request = CloneRequest {
            test_id: test_id.to_string(),
            patient_ids: patient_ids.clone(),
            bundle_version: test.bundle_version().to_string(),
            negation_codes: self.config.negation_codes_for(test.bundle_version()),
        };
        if let Err(source) = self.clone_job.perform(&request) {
            warn!(test_id = %test_id, error = %source, "Population clone failed, rolling back");
            let cause = LifecycleError::Clone {
                test_id: test_id.to_string(),
                source,
            };
            return Err(self.roll_back(test, TestState::Pending, cause));
        }

        let expected = test.version();
        test.set_patient_ids(patient_ids);
        self.save(&test, expected)?;
        info!(
            test_id = %test_id,
            patients = test.patient_ids().len(),
            "Population generated"
        );

        self.calculate(test_id)
    }

    /// Dispatches measure evaluation for a test whose population is ready.
    ///
    /// The new state is persisted before the request is enqueued. If the
    /// queue rejects the request the test is rolled back to
    /// `generating_records` and the call may be retried.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] unless the test is
    /// `generating_records`, [`LifecycleError::Dispatch`] if the queue
    /// rejects the request, and [`LifecycleError::Conflict`] on concurrent
    /// modification.
    pub fn calculate(&self, test_id: &str) -> Result<CalculatedTest, LifecycleError> {
        let mut test = self.tests.get(test_id)?;
        ensure_transition(
            &test,
            TestState::GeneratingRecords,
            TestState::CalculatingExpectedResults,
        )?;

        let expected = test.version();
        test.transition_to(TestState::CalculatingExpectedResults)?;
        self.save(&test, expected)?;

        let request = EvaluationRequest {
            test_id: test_id.to_string(),
        };
        if let Err(source) = self.queue.enqueue(request) {
            warn!(test_id = %test_id, error = %source, "Evaluation dispatch rejected, rolling back");
            let cause = LifecycleError::Dispatch {
                test_id: test_id.to_string(),
                source,
            };
            return Err(self.roll_back(test, TestState::GeneratingRecords, cause));
        }
        info!(test_id = %test_id, "Expected result calculation dispatched");
        Ok(test)
    }

    /// Records the expected results reported by the evaluation job.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::UnexpectedState`] unless the test is
    /// `calculating_expected_results`, and [`LifecycleError::Conflict`] on
    /// concurrent modification.
    pub fn record_expected_results(
        &self,
        test_id: &str,
        results: ResultsMap,
    ) -> Result<CalculatedTest, LifecycleError> {
        let mut test = self.tests.get(test_id)?;
        if test.state() != TestState::CalculatingExpectedResults {
            return Err(LifecycleError::UnexpectedState {
                test_id: test_id.to_string(),
                state: test.state(),
                expected: TestState::CalculatingExpectedResults,
            });
        }

        let expected = test.version();
        let measures = results.len();
        test.set_expected_results(results);
        self.save(&test, expected)?;
        info!(test_id = %test_id, measures, "Expected results recorded");
        Ok(test)
    }

    /// Returns the minimal set followed by a random overflow sample of the
    /// configured size.
    fn with_overflow_sample(&self, coverage: Coverage) -> Vec<PatientId> {
        let Coverage {
            mut minimal_set,
            overflow,
        } = coverage;
        let sample_size = self.config.population.overflow_sample_size;
        if sample_size == 0 {
            return minimal_set;
        }

        let candidates: Vec<&PatientId> = overflow
            .iter()
            .filter(|p| !minimal_set.contains(*p))
            .collect();
        let sample: Vec<PatientId> = candidates
            .choose_multiple(&mut rand::thread_rng(), sample_size)
            .map(|p| (*p).clone())
            .collect();
        minimal_set.extend(sample);
        minimal_set
    }

    /// Moves `test` back to `target` after a failed step and returns the
    /// error to report.
    ///
    /// A failed rollback save is retried once on a freshly loaded copy, as
    /// long as nobody moved the test on in between. If that fails too the
    /// result is [`LifecycleError::Rollback`] carrying both errors.
    fn roll_back(
        &self,
        mut test: CalculatedTest,
        target: TestState,
        cause: LifecycleError,
    ) -> LifecycleError {
        let from = test.state();
        let Err(first) = self.transition_and_save(&mut test, target) else {
            return cause;
        };
        warn!(
            test_id = %test.id(),
            error = %first,
            "Rollback save failed, retrying on reloaded test"
        );

        let retried = self
            .tests
            .get(test.id())
            .map_err(LifecycleError::from)
            .and_then(|mut fresh| {
                if fresh.state() == from {
                    self.transition_and_save(&mut fresh, target)
                } else {
                    Ok(())
                }
            });
        match retried {
            Ok(()) => cause,
            Err(rollback) => LifecycleError::Rollback {
                test_id: test.id().to_string(),
                cause: Box::new(cause),
                rollback: Box::new(rollback),
            },
        }
    }

    fn transition_and_save(
        &self,
        test: &mut CalculatedTest,
        target: TestState,
    ) -> Result<(), LifecycleError> {
        let expected = test.version();
        test.transition_to(target)?;
        self.save(test, expected)
    }

    fn save(&self, test: &CalculatedTest, expected_version: u64) -> Result<(), LifecycleError> {
        self.tests
            .save(test, expected_version)
            .map_err(|err| match err {
                PortError::Conflict {
                    id,
                    expected,
                    actual,
                } => LifecycleError::Conflict {
                    test_id: id,
                    expected,
                    actual,
                },
                other => LifecycleError::Repository(other),
            })
    }
}

impl std::fmt::Debug for TestLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestLifecycle")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

/// Checks that `test` is in `from` and may move on to `target`.
fn ensure_transition(
    test: &CalculatedTest,
    from: TestState,
    target: TestState,
) -> Result<(), LifecycleError> {
    if test.state() == from && test.state().can_transition_to(target) {
        Ok(())
    } else {
        Err(LifecycleError::invalid_transition(test.id(), test.state(), target))
    }
}
