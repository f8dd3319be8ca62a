//! Tests for the domain model.

use super::*;

// =============================================================================
// Test state machine
// =============================================================================

#[test]
fn test_state_transitions() {
    assert!(TestState::Pending.can_transition_to(TestState::GeneratingRecords));
    assert!(!TestState::Pending.can_transition_to(TestState::CalculatingExpectedResults));
    assert!(TestState::GeneratingRecords.can_transition_to(TestState::CalculatingExpectedResults));
    assert!(TestState::GeneratingRecords.can_transition_to(TestState::Pending));
    assert!(TestState::CalculatingExpectedResults.can_transition_to(TestState::GeneratingRecords));
    assert!(!TestState::CalculatingExpectedResults.can_transition_to(TestState::Pending));
}

#[test]
fn test_state_serializes_snake_case() {
    let json = serde_json::to_string(&TestState::CalculatingExpectedResults).unwrap();
    assert_eq!(json, "\"calculating_expected_results\"");
    assert_eq!(
        TestState::GeneratingRecords.to_string(),
        TestState::GeneratingRecords.as_str()
    );
}

#[test]
fn test_new_test_deduplicates_measures() {
    let test = CalculatedTest::new("TEST-1", ["m1", "m2", "m1"], "2023.0.0");
    assert_eq!(test.measure_ids(), ["m1", "m2"]);
    assert_eq!(test.state(), TestState::Pending);
    assert_eq!(test.version(), 1);
    assert!(test.expected_results().is_none());
    assert!(!test.is_ready());
}

#[test]
fn test_transition_bumps_version_and_returns_previous_state() {
    let mut test = CalculatedTest::new("TEST-1", ["m1"], "2023.0.0");

    let previous = test.transition_to(TestState::GeneratingRecords).unwrap();

    assert_eq!(previous, TestState::Pending);
    assert_eq!(test.state(), TestState::GeneratingRecords);
    assert_eq!(test.version(), 2);
}

#[test]
fn test_invalid_transition_leaves_test_untouched() {
    let mut test = CalculatedTest::new("TEST-1", ["m1"], "2023.0.0");

    let err = test
        .transition_to(TestState::CalculatingExpectedResults)
        .unwrap_err();

    assert!(err.to_string().contains("pending -> calculating_expected_results"));
    assert_eq!(test.state(), TestState::Pending);
    assert_eq!(test.version(), 1);
}

#[test]
fn test_ready_requires_state_and_results() {
    let mut test = CalculatedTest::new("TEST-1", ["m1"], "2023.0.0");
    test.set_expected_results(ResultsMap::new());
    assert!(!test.is_ready());

    test.transition_to(TestState::GeneratingRecords).unwrap();
    test.transition_to(TestState::CalculatingExpectedResults).unwrap();
    assert!(test.is_ready());
}

// =============================================================================
// Executions
// =============================================================================

fn execution(errors: Vec<ExecutionError>) -> Execution {
    Execution::new("EXEC-1", "TEST-1", ResultsMap::new(), ResultsMap::new(), errors)
}

#[test]
fn test_warnings_never_fail_an_execution() {
    let mut execution = execution(vec![
        ExecutionError::warning("first"),
        ExecutionError::warning("second"),
    ]);

    assert_eq!(execution.outcome(), ExecutionOutcome::Pending);
    assert_eq!(execution.classify(), ExecutionOutcome::Passed);
    assert!(execution.passed());
}

#[test]
fn test_any_error_fails_an_execution() {
    let mut execution = execution(vec![
        ExecutionError::warning("first"),
        ExecutionError::error("wrong count"),
    ]);

    assert_eq!(execution.classify(), ExecutionOutcome::Failed);
    assert_eq!(execution.error_count(), 1);
}

#[test]
fn test_compare_against_ignores_self_and_duplicates() {
    let mut execution = execution(Vec::new());
    execution.compare_against("EXEC-0");
    execution.compare_against("EXEC-0");
    execution.compare_against("EXEC-1");

    assert_eq!(execution.compared_against(), ["EXEC-0"]);
}

#[test]
fn test_errors_in_file_selects_by_file_name() {
    let execution = execution(vec![
        ExecutionError::error("a").in_file("a.xml"),
        ExecutionError::error("global"),
        ExecutionError::error("b").in_file("b.xml"),
    ]);

    let in_a: Vec<_> = execution.errors_in_file(Some("a.xml")).map(ExecutionError::message).collect();
    let global: Vec<_> = execution.errors_in_file(None).map(ExecutionError::message).collect();

    assert_eq!(in_a, ["a"]);
    assert_eq!(global, ["global"]);
}

#[test]
fn test_error_categories() {
    let qrda = ExecutionError::error("schema");
    let reporting = ExecutionError::error("count").with_validator(ValidatorType::Reporting);
    let cms = ExecutionError::warning("cms").with_cms(true);
    let other = ExecutionError::warning("other").with_validator(ValidatorType::Submission);

    assert!(qrda.is_in(ErrorCategory::Qrda));
    assert!(!qrda.is_in(ErrorCategory::NonCmsWarning));
    assert!(reporting.is_in(ErrorCategory::Reporting));
    assert!(cms.is_in(ErrorCategory::CmsWarning));
    assert!(!cms.is_in(ErrorCategory::NonCmsWarning));
    assert!(other.is_in(ErrorCategory::Submission));
    assert!(other.is_in(ErrorCategory::NonCmsWarning));
}

#[test]
fn test_category_labels() {
    let labels: Vec<&str> = ErrorCategory::ALL.iter().map(ErrorCategory::label).collect();
    assert_eq!(
        labels,
        ["QRDA", "Reporting", "Submission", "CMS Warnings", "Other Warnings"]
    );
    assert!(ErrorCategory::CmsWarning.is_related());
    assert!(!ErrorCategory::Qrda.is_related());
}

#[test]
fn test_execution_error_deserializes_with_defaults() {
    let error: ExecutionError =
        serde_json::from_str(r#"{"message": "bad", "msg_type": "warning"}"#).unwrap();

    assert_eq!(error.msg_type(), MsgType::Warning);
    assert_eq!(error.validator(), ValidatorType::Qrda);
    assert!(!error.is_cms());
    assert!(error.location().is_none());
}

// =============================================================================
// Values and measures
// =============================================================================

#[test]
fn test_result_values_keep_their_json_type() {
    let components: ComponentResults =
        serde_json::from_str(r#"{"IPP": 10, "rate": 0.5, "met": true, "code": "A"}"#).unwrap();

    assert_eq!(components["IPP"], ResultValue::Integer(10));
    assert_eq!(components["rate"], ResultValue::Float(0.5));
    assert_eq!(components["met"], ResultValue::Boolean(true));
    assert_eq!(components["code"], ResultValue::Text("A".to_string()));
    assert_ne!(ResultValue::Integer(5), ResultValue::Float(5.0));
}

#[test]
fn test_eligible_measures_are_top_level_ep() {
    let measure = |id: &str, kind, sub_id: Option<&str>| Measure {
        id: id.to_string(),
        hqmf_id: format!("hqmf-{id}"),
        kind,
        sub_id: sub_id.map(str::to_string),
    };
    let catalog = [
        measure("ep1", MeasureKind::Ep, None),
        measure("ep1b", MeasureKind::Ep, Some("b")),
        measure("eh1", MeasureKind::Eh, None),
        measure("ep2", MeasureKind::Ep, None),
    ];

    let ids: Vec<&str> = eligible_measures(&catalog).map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["ep1", "ep2"]);
}
