//! Per-file error collection command.
//!
//! # Commands
//!
//! - `qmcert collect --document <xml> --errors <json>` - Group the errors
//!   of one submission by file and category, correlated with the document
//!
//! Errors whose `file_name` matches the document's base name are grouped
//! under it; errors without a file name are listed as non-file errors.
//! Each `--related <json>` adds a compared-against execution whose
//! warnings are shown alongside.
//!
//! # Exit Codes
//!
//! - 0: Collection succeeded
//! - 3: Collection degraded; the fault is included in the output

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use qmcert_core::collect::ErrorCollector;
use qmcert_core::ports::{
    ExecutionRepository, MemoryArtifactStore, MemoryExecutionRepository, SubmittedArtifact,
};
use qmcert_core::{CertConfig, Execution, ResultsMap};
use tracing::info;

use super::{exit_codes, read_errors};

const EXECUTION_ID: &str = "EXEC-local";
const TEST_ID: &str = "TEST-local";

/// Arguments for `qmcert collect`.
#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Submitted XML document
    #[arg(long)]
    pub document: PathBuf,

    /// JSON array of the execution's errors
    #[arg(long)]
    pub errors: PathBuf,

    /// JSON array of errors from a compared-against execution (repeatable)
    #[arg(long)]
    pub related: Vec<PathBuf>,
}

/// Runs the collect command.
pub fn run(args: &CollectArgs, config: &CertConfig, out: &mut impl Write) -> Result<u8> {
    let artifact = SubmittedArtifact::from_path(&args.document)
        .with_context(|| format!("failed to read {}", args.document.display()))?;
    let errors = read_errors(&args.errors)?;

    let executions = Arc::new(MemoryExecutionRepository::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let file_id = artifacts.insert_file(artifact.file_name.clone(), artifact.content)?;

    let mut execution = Execution::new(
        EXECUTION_ID,
        TEST_ID,
        ResultsMap::new(),
        ResultsMap::new(),
        errors,
    );
    for (index, path) in args.related.iter().enumerate() {
        let mut sibling = Execution::new(
            format!("EXEC-related-{}", index + 1),
            TEST_ID,
            ResultsMap::new(),
            ResultsMap::new(),
            read_errors(path)?,
        );
        sibling.classify();
        executions.save(&sibling)?;
        execution.compare_against(sibling.id());
    }
    execution.set_file_ids(vec![file_id]);
    let outcome = execution.classify();
    executions.save(&execution)?;

    let collector = ErrorCollector::new(executions, artifacts, &config.correlation);
    let collected = collector.collect(&execution);
    info!(
        outcome = %outcome,
        non_file = collected.non_file.len(),
        files = collected.files.len(),
        "Collection finished"
    );

    serde_json::to_writer_pretty(&mut *out, &collected)?;
    writeln!(out)?;

    Ok(if collected.fault.is_some() {
        exit_codes::FAULT
    } else {
        exit_codes::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const DOCUMENT: &str = r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
  <recordTarget><id extension="P1"/></recordTarget>
  <component><section><code code="55186-1"/></section></component>
</ClinicalDocument>"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_collect_groups_document_errors() {
        let dir = tempfile::tempdir().unwrap();
        let args = CollectArgs {
            document: write(dir.path(), "cat1.xml", DOCUMENT),
            errors: write(
                dir.path(),
                "errors.json",
                r#"[
                    {"message": "missing patient", "msg_type": "error", "file_name": "cat1.xml", "location": "/ClinicalDocument/recordTarget"},
                    {"message": "count mismatch", "msg_type": "error", "validator": "reporting"}
                ]"#,
            ),
            related: vec![write(
                dir.path(),
                "related.json",
                r#"[{"message": "old code", "msg_type": "warning", "cms": true, "file_name": "cat1.xml", "location": "/ClinicalDocument/component/section/code"}]"#,
            )],
        };
        let mut out = Vec::new();

        let code = run(&args, &CertConfig::default(), &mut out).unwrap();

        assert_eq!(code, exit_codes::SUCCESS);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["non_file"][0], "count mismatch");
        assert_eq!(value["files"][0]["file_name"], "cat1.xml");
        let annotated = value["files"][0]["annotated_document"].as_str().unwrap();
        assert_eq!(annotated.matches("error_id=").count(), 2);
        assert!(value["fault"].is_null());
    }

    #[test]
    fn test_malformed_document_reports_fault() {
        let dir = tempfile::tempdir().unwrap();
        let args = CollectArgs {
            document: write(dir.path(), "cat1.xml", "<ClinicalDocument>"),
            errors: write(
                dir.path(),
                "errors.json",
                r#"[{"message": "bad", "msg_type": "error", "file_name": "cat1.xml"}]"#,
            ),
            related: Vec::new(),
        };
        let mut out = Vec::new();

        let code = run(&args, &CertConfig::default(), &mut out).unwrap();

        assert_eq!(code, exit_codes::FAULT);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["fault"].as_str().is_some());
        assert!(value["files"].as_array().unwrap().is_empty());
    }
}
