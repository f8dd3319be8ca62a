//! Subcommand implementations.
//!
//! Each command writes its report to the given writer and returns the
//! process exit code.

pub mod collect;
pub mod compare;
pub mod correlate;

use std::path::Path;

use anyhow::{Context, Result};
use qmcert_core::ExecutionError;
use serde::de::DeserializeOwned;

/// Exit codes shared by all commands.
pub mod exit_codes {
    /// Success exit code.
    pub const SUCCESS: u8 = 0;
    /// Reported results differ from the expected ones.
    pub const MISMATCH: u8 = 2;
    /// Error collection degraded and the report is empty.
    pub const FAULT: u8 = 3;
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Reads a JSON array of execution errors.
pub fn read_errors(path: &Path) -> Result<Vec<ExecutionError>> {
    read_json(path)
}
