//! End-to-end certification flow over the in-memory collaborators.
//!
//! A calculated test is created, its evaluation is picked up by a worker
//! task draining the evaluation queue, a vendor submission is executed
//! against it, and the resulting errors are collected for display.

use std::collections::BTreeMap;
use std::sync::Arc;

use qmcert_core::collect::{ErrorCollector, file_error_group};
use qmcert_core::execute::{ExecuteError, TestExecutor};
use qmcert_core::lifecycle::TestLifecycle;
use qmcert_core::model::{
    CalculatedTest, ErrorCategory, Execution, ExecutionError, ExecutionOutcome, ResultValue,
    ResultsMap, TestState,
};
use qmcert_core::ports::{
    ChannelEvaluationQueue, ExecutionRepository, GreedyCoverageSelector, MemoryArtifactStore,
    MemoryExecutionRepository, MemoryTestRepository, PortError, RecordingCloneJob,
    ResultExtractor, StructuralValidator, SubmittedArtifact, TestRepository,
};
use qmcert_core::CertConfig;

const CAT1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinicalDocument xmlns="urn:hl7-org:v3">
  <templateId root="2.16.840.1.113883.10.20.24.1.1" extension="2017-08-01"/>
  <recordTarget>
    <patientRole><id root="1.2.3" extension="P1"/></patientRole>
  </recordTarget>
  <component>
    <structuredBody>
      <component><section><code code="55186-1"/></section></component>
    </structuredBody>
  </component>
</ClinicalDocument>
"#;

// =============================================================================
// Collaborators
// =============================================================================

/// Extractor returning a fixed result set, standing in for QRDA parsing.
struct FixedExtractor(ResultsMap);

impl ResultExtractor for FixedExtractor {
    fn extract_results(&self, _data: &[u8]) -> Result<ResultsMap, PortError> {
        Ok(self.0.clone())
    }
}

struct FixedValidator(Vec<&'static str>);

impl StructuralValidator for FixedValidator {
    fn validate(&self, _data: &[u8]) -> Result<Vec<String>, PortError> {
        Ok(self.0.iter().map(|m| (*m).to_string()).collect())
    }
}

fn numerator(value: i64) -> ResultsMap {
    BTreeMap::from([(
        "measureA".to_string(),
        BTreeMap::from([
            ("IPP".to_string(), ResultValue::Integer(10)),
            ("numerator".to_string(), ResultValue::Integer(value)),
        ]),
    )])
}

struct Platform {
    tests: Arc<MemoryTestRepository>,
    executions: Arc<MemoryExecutionRepository>,
    artifacts: Arc<MemoryArtifactStore>,
    clone_job: Arc<RecordingCloneJob>,
    lifecycle: Arc<TestLifecycle>,
    receiver: tokio::sync::mpsc::Receiver<qmcert_core::ports::EvaluationRequest>,
}

impl Platform {
    fn new() -> Self {
        let config = CertConfig::default();
        let tests = Arc::new(MemoryTestRepository::new());
        let executions = Arc::new(MemoryExecutionRepository::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let clone_job = Arc::new(RecordingCloneJob::new());
        let selector = GreedyCoverageSelector::new()
            .with_patient("P1", ["measureA"])
            .with_patient("P2", ["measureA"])
            .with_patient("P3", ["measureB"]);
        let (queue, receiver) = ChannelEvaluationQueue::new(config.evaluation.queue_capacity);
        let lifecycle = Arc::new(TestLifecycle::new(
            tests.clone(),
            Arc::new(selector),
            clone_job.clone(),
            Arc::new(queue),
            config,
        ));
        Self {
            tests,
            executions,
            artifacts,
            clone_job,
            lifecycle,
            receiver,
        }
    }

    fn executor(&self, reported: ResultsMap, warnings: Vec<&'static str>) -> TestExecutor {
        TestExecutor::new(
            Arc::new(FixedExtractor(reported)),
            Arc::new(FixedValidator(warnings)),
            self.artifacts.clone(),
            self.executions.clone(),
        )
    }

    fn collector(&self) -> ErrorCollector {
        ErrorCollector::new(
            self.executions.clone(),
            self.artifacts.clone(),
            &CertConfig::default().correlation,
        )
    }

    /// Runs the evaluation worker until the queue is drained.
    async fn evaluate_pending(&mut self, results: ResultsMap) {
        let mut requests = Vec::new();
        while let Ok(request) = self.receiver.try_recv() {
            requests.push(request);
        }
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            for request in requests {
                lifecycle
                    .record_expected_results(&request.test_id, results.clone())
                    .expect("record expected results");
            }
        })
        .await
        .expect("evaluation worker");
    }
}

fn ready_test(platform: &Platform) -> CalculatedTest {
    platform.tests.get("TEST-1").expect("load test")
}

// =============================================================================
// Flow
// =============================================================================

#[tokio::test]
async fn test_created_test_becomes_ready_after_evaluation() {
    let mut platform = Platform::new();

    let test = platform
        .lifecycle
        .create(CalculatedTest::new("TEST-1", ["measureA", "measureB"], "2023.0.0"))
        .expect("create test");

    assert_eq!(test.state(), TestState::CalculatingExpectedResults);
    assert!(!test.is_ready());
    let clone_requests = platform.clone_job.requests();
    assert_eq!(clone_requests.len(), 1);
    assert_eq!(clone_requests[0].patient_ids, vec!["P1", "P3"]);

    let executor = platform.executor(numerator(5), Vec::new());
    let err = executor
        .execute(&test, &SubmittedArtifact::new("cat3.xml", CAT1), &[])
        .expect_err("test is not ready yet");
    assert!(matches!(err, ExecuteError::NotReady { .. }));

    platform.evaluate_pending(numerator(5)).await;

    let test = ready_test(&platform);
    assert!(test.is_ready());
    assert_eq!(
        test.expected_results_for("measureA").and_then(|c| c.get("numerator")),
        Some(&ResultValue::Integer(5))
    );
}

#[tokio::test]
async fn test_mismatched_submission_is_collected_by_file() {
    let mut platform = Platform::new();
    platform
        .lifecycle
        .create(CalculatedTest::new("TEST-1", ["measureA"], "2023.0.0"))
        .expect("create test");
    platform.evaluate_pending(numerator(5)).await;
    let test = ready_test(&platform);

    // An earlier execution whose warnings are shown alongside the new one.
    let mut sibling = Execution::new(
        "EXEC-EARLIER",
        test.id(),
        numerator(5),
        numerator(5),
        vec![
            ExecutionError::warning("CMS requires a patient identifier")
                .with_cms(true)
                .in_file("cat3.xml")
                .at("/*:ClinicalDocument[namespace-uri()='urn:hl7-org:v3'][1]/*:recordTarget[namespace-uri()='urn:hl7-org:v3'][1]"),
            ExecutionError::warning("section code should be LOINC")
                .in_file("cat3.xml")
                .at("/ClinicalDocument/component/structuredBody/component/section/code/@code"),
        ],
    );
    sibling.classify();
    platform.executions.save(&sibling).expect("save sibling");

    let executor = platform.executor(numerator(3), vec!["templateId extension is outdated"]);
    let execution = executor
        .execute(
            &test,
            &SubmittedArtifact::new("cat3.xml", CAT1),
            &[sibling.id().to_string()],
        )
        .expect("execute");

    assert_eq!(execution.outcome(), ExecutionOutcome::Failed);
    assert_eq!(execution.error_count(), 1);

    let collected = platform.collector().collect(&execution);
    assert!(collected.fault.is_none());
    assert_eq!(collected.non_file.len(), 1);
    assert!(collected.non_file[0]
        .contains("expected numerator value 5 does not match reported value 3"));

    let group = file_error_group(&collected, "cat3_xml").expect("file group");
    assert_eq!(group.file_name, "cat3.xml");
    assert_eq!(group.bucket(ErrorCategory::Qrda).map(|b| b.errors.len()), Some(1));
    assert!(group.bucket(ErrorCategory::Reporting).is_some_and(|b| b.is_empty()));

    let cms = group.bucket(ErrorCategory::CmsWarning).expect("cms bucket");
    assert_eq!(cms.errors.len(), 1);
    assert_eq!(cms.correlation.error_map.len(), 1);

    let other = group.bucket(ErrorCategory::NonCmsWarning).expect("other bucket");
    assert_eq!(other.correlation.error_attributes.len(), 1);
    assert_eq!(other.correlation.error_attributes[0].name, "code");
    assert_eq!(other.correlation.error_attributes[0].value, "55186-1");

    let annotated = group.annotated_document.as_deref().expect("annotated document");
    assert_eq!(annotated.matches("error_id=").count(), 2);
}
