//! Tests for error collection.

use super::*;
use crate::model::{ResultsMap, ValidatorType};
use crate::ports::{MemoryArtifactStore, MemoryExecutionRepository};

const FILE: &str = "cat1.xml";

const DOCUMENT: &str = r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
  <templateId root="2.16.840.1.113883.10.20.24.1.1"/>
  <recordTarget><patientRole><id extension="12345"/></patientRole></recordTarget>
  <component><structuredBody/></component>
</ClinicalDocument>"#;

struct Fixture {
    executions: Arc<MemoryExecutionRepository>,
    artifacts: Arc<MemoryArtifactStore>,
    collector: ErrorCollector,
}

impl Fixture {
    fn new() -> Self {
        let executions = Arc::new(MemoryExecutionRepository::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let collector = ErrorCollector::new(
            executions.clone(),
            artifacts.clone(),
            &CorrelationConfig::default(),
        );
        Self {
            executions,
            artifacts,
            collector,
        }
    }

    fn execution(&self, id: &str, errors: Vec<ExecutionError>, content: Option<&str>) -> Execution {
        let mut execution = Execution::new(id, "TEST-1", ResultsMap::new(), ResultsMap::new(), errors);
        if let Some(content) = content {
            let file_id = self.artifacts.insert_file(FILE, content).unwrap();
            execution.set_file_ids(vec![file_id]);
        }
        self.executions.save(&execution).unwrap();
        execution
    }
}

fn qrda(message: &str, location: &str) -> ExecutionError {
    ExecutionError::error(message).in_file(FILE).at(location)
}

#[test]
fn test_no_errors_collects_nothing() {
    let fixture = Fixture::new();
    let execution = fixture.execution("EXEC-1", Vec::new(), Some(DOCUMENT));

    let collected = fixture.collector.collect(&execution);

    assert!(collected.is_empty());
    assert!(collected.fault.is_none());
}

#[test]
fn test_non_file_messages_are_merged_and_deduplicated() {
    let fixture = Fixture::new();
    let sibling = fixture.execution(
        "EXEC-SIBLING",
        vec![
            ExecutionError::error("zip is malformed"),
            ExecutionError::warning("late submission"),
        ],
        None,
    );
    let mut execution = fixture.execution(
        "EXEC-1",
        vec![
            ExecutionError::error("zip is malformed"),
            ExecutionError::error("missing measure"),
            ExecutionError::error("zip is malformed"),
        ],
        None,
    );
    execution.compare_against(sibling.id());

    let collected = fixture.collector.collect(&execution);

    assert_eq!(
        collected.non_file,
        vec!["zip is malformed", "missing measure", "late submission"]
    );
    assert!(collected.files.is_empty());
}

#[test]
fn test_own_errors_fill_validator_buckets() {
    let fixture = Fixture::new();
    let execution = fixture.execution(
        "EXEC-1",
        vec![
            qrda("bad template", "/ClinicalDocument/templateId"),
            ExecutionError::warning("odd patient id")
                .in_file(FILE)
                .at("/ClinicalDocument/recordTarget/patientRole/id"),
            ExecutionError::error("wrong count")
                .in_file(FILE)
                .with_validator(ValidatorType::Reporting),
            ExecutionError::error("bad encoding")
                .in_file(FILE)
                .with_validator(ValidatorType::Submission),
        ],
        Some(DOCUMENT),
    );

    let collected = fixture.collector.collect(&execution);
    let group = collected.file(FILE).unwrap();

    assert_eq!(group.bucket(ErrorCategory::Qrda).unwrap().errors.len(), 2);
    assert_eq!(group.bucket(ErrorCategory::Reporting).unwrap().errors.len(), 1);
    assert_eq!(group.bucket(ErrorCategory::Submission).unwrap().errors.len(), 1);
    assert!(group.bucket(ErrorCategory::CmsWarning).unwrap().is_empty());
    assert!(group.bucket(ErrorCategory::NonCmsWarning).unwrap().is_empty());
    assert_eq!(group.error_count(), 4);

    let correlation = &group.bucket(ErrorCategory::Qrda).unwrap().correlation;
    assert_eq!(correlation.error_map.len(), 2);
}

#[test]
fn test_sibling_errors_fill_only_warning_buckets() {
    let fixture = Fixture::new();
    let sibling = fixture.execution(
        "EXEC-SIBLING",
        vec![
            ExecutionError::warning("cms rule")
                .with_cms(true)
                .in_file(FILE)
                .at("/ClinicalDocument/templateId"),
            ExecutionError::warning("style rule")
                .in_file(FILE)
                .at("/ClinicalDocument/component"),
            ExecutionError::error("sibling error").in_file(FILE),
            ExecutionError::warning("other file").in_file("other.xml"),
        ],
        None,
    );
    let mut execution = fixture.execution("EXEC-1", Vec::new(), Some(DOCUMENT));
    execution.compare_against(sibling.id());

    let collected = fixture.collector.collect(&execution);
    let group = collected.file(FILE).unwrap();

    assert!(group.bucket(ErrorCategory::Qrda).unwrap().is_empty());
    let cms = group.bucket(ErrorCategory::CmsWarning).unwrap();
    assert_eq!(cms.errors.len(), 1);
    assert_eq!(cms.errors[0].message(), "cms rule");
    let other = group.bucket(ErrorCategory::NonCmsWarning).unwrap();
    assert_eq!(other.errors.len(), 1);
    assert_eq!(other.errors[0].message(), "style rule");
}

#[test]
fn test_buckets_share_identifiers_for_one_node() {
    let fixture = Fixture::new();
    let location = "/ClinicalDocument/templateId";
    let sibling = fixture.execution(
        "EXEC-SIBLING",
        vec![ExecutionError::warning("cms rule")
            .with_cms(true)
            .in_file(FILE)
            .at(location)],
        None,
    );
    let mut execution = fixture.execution(
        "EXEC-1",
        vec![qrda("bad template", location)],
        Some(DOCUMENT),
    );
    execution.compare_against(sibling.id());

    let collected = fixture.collector.collect(&execution);
    let group = collected.file(FILE).unwrap();

    let own_id = group.bucket(ErrorCategory::Qrda).unwrap().correlation.error_id(location);
    let cms_id = group
        .bucket(ErrorCategory::CmsWarning)
        .unwrap()
        .correlation
        .error_id(location);
    assert!(own_id.is_some());
    assert_eq!(own_id, cms_id);

    let annotated = group.annotated_document.as_deref().unwrap();
    assert_eq!(annotated.matches("error_id=").count(), 1);
}

#[test]
fn test_files_without_errors_are_skipped() {
    let fixture = Fixture::new();
    let execution = fixture.execution(
        "EXEC-1",
        vec![ExecutionError::error("elsewhere").in_file("other.xml")],
        Some(DOCUMENT),
    );

    let collected = fixture.collector.collect(&execution);

    assert!(collected.files.is_empty());
    assert!(collected.fault.is_none());
}

#[test]
fn test_file_with_only_unbucketed_errors_keeps_empty_group() {
    let fixture = Fixture::new();
    let sibling = fixture.execution(
        "EXEC-SIBLING",
        vec![ExecutionError::error("sibling error").in_file(FILE)],
        None,
    );
    let mut execution = fixture.execution("EXEC-1", Vec::new(), Some("<not-xml"));
    execution.compare_against(sibling.id());

    let collected = fixture.collector.collect(&execution);

    // The document is never parsed because every bucket is empty.
    assert!(collected.fault.is_none());
    let group = collected.file(FILE).unwrap();
    assert_eq!(group.buckets.len(), ErrorCategory::ALL.len());
    assert_eq!(group.error_count(), 0);
    assert!(group.buckets.iter().all(|b| b.correlation.is_empty()));
    assert!(group.annotated_document.is_none());
}

#[test]
fn test_missing_sibling_degrades_to_fault() {
    let fixture = Fixture::new();
    let mut execution = fixture.execution(
        "EXEC-1",
        vec![ExecutionError::error("kept out")],
        Some(DOCUMENT),
    );
    execution.compare_against("EXEC-GONE");

    let collected = fixture.collector.collect(&execution);

    assert!(collected.is_empty());
    assert!(matches!(
        collected.fault,
        Some(CollectError::Sibling { ref execution_id, .. }) if execution_id == "EXEC-GONE"
    ));
}

#[test]
fn test_malformed_document_degrades_to_fault() {
    let fixture = Fixture::new();
    let execution = fixture.execution(
        "EXEC-1",
        vec![qrda("bad template", "/ClinicalDocument/templateId")],
        Some("<ClinicalDocument><unclosed></ClinicalDocument>"),
    );

    let collected = fixture.collector.collect(&execution);

    assert!(collected.is_empty());
    assert!(matches!(collected.fault, Some(CollectError::Document { .. })));
}

#[test]
fn test_unknown_file_id_degrades_to_fault() {
    let fixture = Fixture::new();
    let mut execution = fixture.execution("EXEC-1", vec![qrda("x", "/")], None);
    execution.set_file_ids(vec!["FILE-missing".to_string()]);

    let collected = fixture.collector.collect(&execution);

    assert!(collected.is_empty());
    assert!(matches!(collected.fault, Some(CollectError::Artifact { .. })));
}

#[test]
fn test_fault_serializes_as_message() {
    let collected = CollectedErrors {
        fault: Some(CollectError::file_not_found("a.xml")),
        ..CollectedErrors::default()
    };

    let json = serde_json::to_value(&collected).unwrap();
    assert_eq!(json["fault"], "could not find results for file a.xml");
    assert_eq!(json["non_file"], serde_json::json!([]));
}

// =============================================================================
// Route lookup
// =============================================================================

#[test]
fn test_route_file_name_replaces_dots() {
    assert_eq!(route_file_name("cat1.patient.xml"), "cat1_patient_xml");
}

#[test]
fn test_file_error_group_matches_route_encoded_name() {
    let fixture = Fixture::new();
    let execution = fixture.execution(
        "EXEC-1",
        vec![qrda("bad template", "/ClinicalDocument/templateId")],
        Some(DOCUMENT),
    );
    let collected = fixture.collector.collect(&execution);

    assert_eq!(file_error_group(&collected, "cat1_xml").unwrap().file_name, FILE);
    assert_eq!(file_error_group(&collected, FILE).unwrap().file_name, FILE);
    assert_eq!(
        file_error_group(&collected, "cat3.xml"),
        Err(CollectError::file_not_found("cat3.xml"))
    );
}
