//! Result comparison command.
//!
//! # Commands
//!
//! - `qmcert compare --expected <file> --reported <file>` - Compare
//!   reported measure results against expected ones
//!
//! Both files hold a JSON object of measure id to component results.
//!
//! # Exit Codes
//!
//! - 0: Every expected component matches
//! - 2: At least one measure differs

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use qmcert_core::ResultsMap;
use qmcert_core::compare::{DiscrepancyRenderer, LegacyRenderer, compare};
use qmcert_core::ports::{JsonResultExtractor, ResultExtractor};
use tracing::info;

use super::{exit_codes, read_json};

/// Arguments for `qmcert compare`.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Expected results file
    #[arg(long)]
    pub expected: PathBuf,

    /// Reported results file
    #[arg(long)]
    pub reported: PathBuf,

    /// Output discrepancies as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the compare command.
pub fn run(args: &CompareArgs, out: &mut impl Write) -> Result<u8> {
    let expected: ResultsMap = read_json(&args.expected)?;
    let data = std::fs::read(&args.reported)
        .with_context(|| format!("failed to read {}", args.reported.display()))?;
    let reported = JsonResultExtractor
        .extract_results(&data)
        .with_context(|| format!("failed to extract results from {}", args.reported.display()))?;

    let groups = compare(&expected, &reported);
    info!(
        measures = expected.len(),
        mismatched = groups.len(),
        "Comparison finished"
    );

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &groups)?;
        writeln!(out)?;
    } else if groups.is_empty() {
        writeln!(out, "all expected results match")?;
    } else {
        for group in &groups {
            writeln!(out, "{}: {}", group.measure_id, LegacyRenderer.render(group))?;
        }
    }

    Ok(if groups.is_empty() {
        exit_codes::SUCCESS
    } else {
        exit_codes::MISMATCH
    })
}
