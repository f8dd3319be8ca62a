//! In-memory collaborator implementations.
//!
//! These back the test suite and the CLI. They are thread-safe but keep all
//! state in process memory and are not meant for production storage.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError, RwLock};

use uuid::Uuid;

use super::{
    ArtifactStore, CloneRequest, Coverage, ExecutionRepository, PopulationCloneJob,
    PopulationSelector, PortError, ResultExtractor, SubmittedArtifact, TestRepository,
};
use crate::model::{CalculatedTest, Execution, FileId, MeasureId, PatientId, ResultsMap};

fn poisoned<T>(collaborator: &'static str) -> impl FnOnce(PoisonError<T>) -> PortError {
    move |_| PortError::unavailable(collaborator, "lock poisoned")
}

// ============================================================================
// Repositories
// ============================================================================

/// In-memory test repository with version compare-and-swap.
#[derive(Debug, Default)]
pub struct MemoryTestRepository {
    tests: RwLock<HashMap<String, CalculatedTest>>,
}

impl MemoryTestRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TestRepository for MemoryTestRepository {
    fn insert(&self, test: &CalculatedTest) -> Result<(), PortError> {
        let mut tests = self.tests.write().map_err(poisoned("test repository"))?;
        if let Some(existing) = tests.get(test.id()) {
            return Err(PortError::conflict(test.id(), 0, existing.version()));
        }
        tests.insert(test.id().to_string(), test.clone());
        Ok(())
    }

    fn get(&self, test_id: &str) -> Result<CalculatedTest, PortError> {
        let tests = self.tests.read().map_err(poisoned("test repository"))?;
        tests
            .get(test_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("test", test_id))
    }

    fn save(&self, test: &CalculatedTest, expected_version: u64) -> Result<(), PortError> {
        let mut tests = self.tests.write().map_err(poisoned("test repository"))?;
        let stored = tests
            .get_mut(test.id())
            .ok_or_else(|| PortError::not_found("test", test.id()))?;
        if stored.version() != expected_version {
            return Err(PortError::conflict(
                test.id(),
                expected_version,
                stored.version(),
            ));
        }
        *stored = test.clone();
        Ok(())
    }
}

/// In-memory execution repository.
#[derive(Debug, Default)]
pub struct MemoryExecutionRepository {
    executions: RwLock<HashMap<String, Execution>>,
}

impl MemoryExecutionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored executions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executions.read().map_or(0, |e| e.len())
    }

    /// Returns `true` if no execution is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExecutionRepository for MemoryExecutionRepository {
    fn save(&self, execution: &Execution) -> Result<(), PortError> {
        let mut executions = self
            .executions
            .write()
            .map_err(poisoned("execution repository"))?;
        executions.insert(execution.id().to_string(), execution.clone());
        Ok(())
    }

    fn get(&self, execution_id: &str) -> Result<Execution, PortError> {
        let executions = self
            .executions
            .read()
            .map_err(poisoned("execution repository"))?;
        executions
            .get(execution_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("execution", execution_id))
    }
}

// ============================================================================
// Artifact store
// ============================================================================

#[derive(Debug, Clone)]
struct StoredFile {
    name: String,
    content: Vec<u8>,
}

/// In-memory artifact store.
///
/// Each saved artifact becomes one stored file with a fresh `FILE-` id.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    files: RwLock<HashMap<FileId, StoredFile>>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a single named file and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Unavailable`] if the store lock is poisoned.
    pub fn insert_file(
        &self,
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Result<FileId, PortError> {
        let file_id = format!("FILE-{}", Uuid::new_v4());
        let mut files = self.files.write().map_err(poisoned("artifact store"))?;
        files.insert(
            file_id.clone(),
            StoredFile {
                name: name.into(),
                content: content.into(),
            },
        );
        Ok(file_id)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save_artifacts(
        &self,
        artifact: &SubmittedArtifact,
        _execution: &Execution,
    ) -> Result<Vec<FileId>, PortError> {
        let file_id = self.insert_file(artifact.file_name.clone(), artifact.content.clone())?;
        Ok(vec![file_id])
    }

    fn file_names(&self, file_ids: &[FileId]) -> Result<Vec<String>, PortError> {
        let files = self.files.read().map_err(poisoned("artifact store"))?;
        file_ids
            .iter()
            .map(|id| {
                files
                    .get(id)
                    .map(|f| f.name.clone())
                    .ok_or_else(|| PortError::not_found("file", id.clone()))
            })
            .collect()
    }

    fn read_file(&self, file_ids: &[FileId], file_name: &str) -> Result<Vec<u8>, PortError> {
        let files = self.files.read().map_err(poisoned("artifact store"))?;
        file_ids
            .iter()
            .filter_map(|id| files.get(id))
            .find(|f| f.name == file_name)
            .map(|f| f.content.clone())
            .ok_or_else(|| PortError::not_found("file", file_name))
    }
}

// ============================================================================
// Population
// ============================================================================

/// Population selector computing a greedy set cover over a fixed patient
/// catalog.
///
/// Each round picks the patient covering the most still-uncovered measures,
/// preferring earlier catalog entries on ties. Patients relevant to at least
/// one requested measure but not picked form the overflow set.
#[derive(Debug, Clone, Default)]
pub struct GreedyCoverageSelector {
    patients: Vec<(PatientId, BTreeSet<MeasureId>)>,
}

impl GreedyCoverageSelector {
    /// Creates a selector with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a patient and the measures its data satisfies.
    #[must_use]
    pub fn with_patient(
        mut self,
        patient_id: impl Into<PatientId>,
        measures: impl IntoIterator<Item = impl Into<MeasureId>>,
    ) -> Self {
        self.patients.push((
            patient_id.into(),
            measures.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

impl PopulationSelector for GreedyCoverageSelector {
    fn min_coverage(&self, measure_ids: &[MeasureId]) -> Result<Coverage, PortError> {
        let mut uncovered: BTreeSet<&MeasureId> = measure_ids.iter().collect();
        let mut picked = vec![false; self.patients.len()];
        let mut minimal_set = Vec::new();

        while !uncovered.is_empty() {
            let best = self
                .patients
                .iter()
                .enumerate()
                .filter(|(idx, _)| !picked[*idx])
                .map(|(idx, (_, covers))| {
                    (idx, covers.iter().filter(|m| uncovered.contains(m)).count())
                })
                .filter(|(_, gain)| *gain > 0)
                .fold(None, |best: Option<(usize, usize)>, candidate| match best {
                    Some(b) if b.1 >= candidate.1 => Some(b),
                    _ => Some(candidate),
                });

            let Some((idx, _)) = best else {
                break;
            };
            picked[idx] = true;
            let (patient_id, covers) = &self.patients[idx];
            for measure_id in covers {
                uncovered.remove(&measure_id);
            }
            minimal_set.push(patient_id.clone());
        }

        let overflow = self
            .patients
            .iter()
            .enumerate()
            .filter(|(idx, (_, covers))| {
                !picked[*idx] && covers.iter().any(|m| measure_ids.contains(m))
            })
            .map(|(_, (patient_id, _))| patient_id.clone())
            .collect();

        Ok(Coverage {
            minimal_set,
            overflow,
        })
    }
}

/// Clone job that records every request it receives.
///
/// Configured with [`RecordingCloneJob::failing`], every call fails instead.
#[derive(Debug, Default)]
pub struct RecordingCloneJob {
    requests: Mutex<Vec<CloneRequest>>,
    failure: Option<String>,
}

impl RecordingCloneJob {
    /// Creates a clone job that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clone job that always fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            requests: Mutex::default(),
            failure: Some(reason.into()),
        }
    }

    /// Returns the requests received so far, including failed ones.
    #[must_use]
    pub fn requests(&self) -> Vec<CloneRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl PopulationCloneJob for RecordingCloneJob {
    fn perform(&self, request: &CloneRequest) -> Result<(), PortError> {
        self.requests
            .lock()
            .map_err(poisoned("population clone job"))?
            .push(request.clone());
        match &self.failure {
            Some(reason) => Err(PortError::unavailable("population clone job", reason.clone())),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extracts reported results from a JSON document shaped like
/// `{"measure": {"component": value}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultExtractor;

impl ResultExtractor for JsonResultExtractor {
    fn extract_results(&self, data: &[u8]) -> Result<ResultsMap, PortError> {
        serde_json::from_slice(data).map_err(|e| PortError::parse(e.to_string()))
    }
}
