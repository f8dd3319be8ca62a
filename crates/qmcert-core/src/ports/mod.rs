//! Contracts for the collaborators the certification core depends on.
//!
//! Persistence, population cloning, measure evaluation, QRDA extraction and
//! artifact storage live outside this crate. Each is expressed as a
//! `Send + Sync` trait so callers can plug in their own backends; in-memory
//! implementations in [`memory`] and [`queue`] back the tests and the CLI.
//!
//! # Contracts
//!
//! - `PopulationCloneJob::perform` is synchronous and must complete or fail
//!   before the lifecycle proceeds.
//! - `EvaluationQueue::enqueue` never waits for the evaluation itself.
//! - `ResultExtractor::extract_results` fails on malformed input rather than
//!   returning an empty map.
//! - `StructuralValidator::validate` reports non-compliance as messages and
//!   fails only when the validator itself cannot run.
//! - `TestRepository::save` is a compare-and-swap on the test version.

mod error;
pub mod memory;
pub mod queue;


use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::PortError;
pub use memory::{
    GreedyCoverageSelector, JsonResultExtractor, MemoryArtifactStore, MemoryExecutionRepository,
    MemoryTestRepository, RecordingCloneJob,
};
pub use queue::ChannelEvaluationQueue;

use crate::model::{
    CalculatedTest, Execution, FileId, MeasureId, PatientId, ResultsMap, TestId,
};

/// Result of a minimal-coverage population query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Smallest patient set satisfying every measure's data requirements.
    pub minimal_set: Vec<PatientId>,
    /// Relevant candidates left unused by the minimal set.
    pub overflow: Vec<PatientId>,
}

/// Request handed to the population clone job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneRequest {
    /// Test the cloned records belong to.
    pub test_id: TestId,
    /// Patients to clone.
    pub patient_ids: Vec<PatientId>,
    /// Measure bundle version of the test.
    pub bundle_version: String,
    /// Default codes substituted for negated value sets, keyed by value set
    /// OID, for `bundle_version`.
    pub negation_codes: BTreeMap<String, String>,
}

/// Request handed to the measure evaluation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Test whose expected results should be calculated.
    pub test_id: TestId,
}

/// A vendor-submitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedArtifact {
    /// Original file name.
    pub file_name: String,
    /// Raw file content.
    pub content: Vec<u8>,
}

impl SubmittedArtifact {
    /// Creates an artifact from in-memory content.
    #[must_use]
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Reads an artifact from disk, keeping the file's base name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { file_name, content })
    }
}

/// Selects the reference population for a set of measures.
pub trait PopulationSelector: Send + Sync {
    /// Returns the minimal covering patient set for `measure_ids`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the population cannot be queried.
    fn min_coverage(&self, measure_ids: &[MeasureId]) -> Result<Coverage, PortError>;
}

/// Clones reference patients into a test's private population.
pub trait PopulationCloneJob: Send + Sync {
    /// Clones the requested patients, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if cloning fails.
    fn perform(&self, request: &CloneRequest) -> Result<(), PortError>;
}

/// Dispatches asynchronous measure evaluation.
pub trait EvaluationQueue: Send + Sync {
    /// Enqueues an evaluation without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the queue rejects the request.
    fn enqueue(&self, request: EvaluationRequest) -> Result<(), PortError>;
}

/// Extracts reported measure results from a submitted document.
pub trait ResultExtractor: Send + Sync {
    /// Parses `data` into measure results.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Parse`] if the document is malformed.
    fn extract_results(&self, data: &[u8]) -> Result<ResultsMap, PortError>;
}

/// Runs structural validation over a submitted document.
pub trait StructuralValidator: Send + Sync {
    /// Returns one message per structural problem found.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if validation could not be performed.
    fn validate(&self, data: &[u8]) -> Result<Vec<String>, PortError>;
}

/// Stores submitted artifacts and serves their files back.
pub trait ArtifactStore: Send + Sync {
    /// Persists `artifact` for `execution` and returns the stored file ids.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the artifact cannot be stored.
    fn save_artifacts(
        &self,
        artifact: &SubmittedArtifact,
        execution: &Execution,
    ) -> Result<Vec<FileId>, PortError>;

    /// Returns the file names behind `file_ids`, in storage order.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::NotFound`] if a file id is unknown.
    fn file_names(&self, file_ids: &[FileId]) -> Result<Vec<String>, PortError>;

    /// Returns the content of the file named `file_name` among `file_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::NotFound`] if no such file is stored.
    fn read_file(&self, file_ids: &[FileId], file_name: &str) -> Result<Vec<u8>, PortError>;
}

/// Persists calculated tests.
pub trait TestRepository: Send + Sync {
    /// Stores a new test.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Conflict`] if a test with the same id exists.
    fn insert(&self, test: &CalculatedTest) -> Result<(), PortError>;

    /// Loads a test by id.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::NotFound`] if the test does not exist.
    fn get(&self, test_id: &str) -> Result<CalculatedTest, PortError>;

    /// Replaces the stored test if its stored version is still
    /// `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Conflict`] if the stored version differs and
    /// [`PortError::NotFound`] if the test does not exist.
    fn save(&self, test: &CalculatedTest, expected_version: u64) -> Result<(), PortError>;
}

/// Persists executions.
pub trait ExecutionRepository: Send + Sync {
    /// Inserts or replaces an execution.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the execution cannot be stored.
    fn save(&self, execution: &Execution) -> Result<(), PortError>;

    /// Loads an execution by id.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::NotFound`] if the execution does not exist.
    fn get(&self, execution_id: &str) -> Result<Execution, PortError>;
}
