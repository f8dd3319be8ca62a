//! Error location correlation command.
//!
//! # Commands
//!
//! - `qmcert correlate --document <xml> --errors <json>` - Resolve the
//!   locations of the given errors against a document and print the
//!   resulting location to error id map
//!
//! With `--annotate <file>` the document is also written out with the
//! generated error ids stamped onto the matched elements.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use qmcert_core::CertConfig;
use qmcert_core::correlate::{Correlator, ErrorIdAssignments, parse_document};
use tracing::info;

use super::{exit_codes, read_errors};

/// Arguments for `qmcert correlate`.
#[derive(Debug, Args)]
pub struct CorrelateArgs {
    /// Submitted XML document
    #[arg(long)]
    pub document: PathBuf,

    /// JSON array of execution errors
    #[arg(long)]
    pub errors: PathBuf,

    /// Write the annotated document to this path
    #[arg(long)]
    pub annotate: Option<PathBuf>,
}

/// Runs the correlate command.
pub fn run(args: &CorrelateArgs, config: &CertConfig, out: &mut impl Write) -> Result<u8> {
    let text = std::fs::read_to_string(&args.document)
        .with_context(|| format!("failed to read {}", args.document.display()))?;
    let document = parse_document(&text)
        .with_context(|| format!("failed to parse {}", args.document.display()))?;
    let errors = read_errors(&args.errors)?;

    let correlator = Correlator::new(&config.correlation);
    let mut assignments = ErrorIdAssignments::new();
    let correlation = correlator.correlate(&document, &errors, &mut assignments);
    info!(
        locations = correlation.error_map.len(),
        attributes = correlation.error_attributes.len(),
        "Correlation finished"
    );

    serde_json::to_writer_pretty(&mut *out, &correlation)?;
    writeln!(out)?;

    if let Some(path) = &args.annotate {
        let annotated = assignments.annotate(&document, correlator.error_id_attribute());
        std::fs::write(path, annotated)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(exit_codes::SUCCESS)
}
