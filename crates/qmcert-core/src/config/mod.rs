//! Configuration parsing and management.
//!
//! Certification settings are read from a TOML file and passed explicitly
//! into the operations that need them. Nothing in this crate consults
//! process-wide configuration mid-algorithm.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Namespace predicate emitted by schematron tooling for HL7 V3 elements.
pub const HL7_NAMESPACE_PREDICATE: &str = "[namespace-uri()='urn:hl7-org:v3']";

/// Attribute name carrying assigned node identifiers.
pub const DEFAULT_ERROR_ID_ATTRIBUTE: &str = "error_id";

/// Top-level certification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CertConfig {
    /// Population selection settings.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Evaluation dispatch settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Document correlation settings.
    #[serde(default)]
    pub correlation: CorrelationConfig,

    /// Default codes substituted for negated value sets, keyed by bundle
    /// version and then by value set OID.
    #[serde(default)]
    pub negation_codes: BTreeMap<String, BTreeMap<String, String>>,
}

impl CertConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.evaluation.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "evaluation.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.correlation.error_id_attribute.trim().is_empty() {
            return Err(ConfigError::Validation(
                "correlation.error_id_attribute must not be empty".to_string(),
            ));
        }
        if self
            .correlation
            .namespace_predicates
            .iter()
            .any(|p| p.is_empty())
        {
            return Err(ConfigError::Validation(
                "correlation.namespace_predicates must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the negation code table for a bundle version, empty when the
    /// version has none.
    #[must_use]
    pub fn negation_codes_for(&self, bundle_version: &str) -> BTreeMap<String, String> {
        self.negation_codes
            .get(bundle_version)
            .cloned()
            .unwrap_or_default()
    }
}

/// Population selection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PopulationConfig {
    /// Number of extra patients drawn at random from the overflow set and
    /// handed to the vendor alongside the minimal covering set.
    #[serde(default)]
    pub overflow_sample_size: usize,
}

/// Evaluation dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Capacity of the evaluation queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

const fn default_queue_capacity() -> usize {
    256
}

/// Document correlation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorrelationConfig {
    /// Attribute that carries node identifiers in source documents.
    #[serde(default = "default_error_id_attribute")]
    pub error_id_attribute: String,

    /// Predicates stripped from locations before resolution.
    #[serde(default = "default_namespace_predicates")]
    pub namespace_predicates: Vec<String>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            error_id_attribute: default_error_id_attribute(),
            namespace_predicates: default_namespace_predicates(),
        }
    }
}

fn default_error_id_attribute() -> String {
    DEFAULT_ERROR_ID_ATTRIBUTE.to_string()
}

fn default_namespace_predicates() -> Vec<String> {
    vec![HL7_NAMESPACE_PREDICATE.to_string()]
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
