//! JSON Schema gating for scoring requests.
//!
//! Every record in a request is validated against the record schema. The
//! outcome selects the evaluation strategy: a violation is a routing signal
//! (oracle-only evaluation), not a request failure.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Embedded default transaction schema (loaded at compile time).
const TRANSACTION_SCHEMA_JSON: &str = include_str!("../schemas/transaction.schema.json");

/// Errors from loading or compiling a schema document.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema document: {0}")]
    Parse(String),

    #[error("Failed to compile schema: {0}")]
    Compile(String),
}

/// Why a record sequence did not match the schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("no records supplied")]
    Empty,

    #[error("record {index} does not match schema: {}", messages.join("; "))]
    Mismatch { index: usize, messages: Vec<String> },
}

/// A compiled record schema, shared read-only across requests.
pub struct RecordSchema {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSchema").finish_non_exhaustive()
    }
}

impl RecordSchema {
    /// Compile a schema from a JSON value.
    pub fn from_value(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .build(schema)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Compile a schema from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Compile a schema from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Load a schema file; `.yaml`/`.yml` files are read as YAML, anything
    /// else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        if is_yaml {
            Self::from_yaml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    /// The embedded default transaction schema.
    pub fn transaction() -> Result<Self, SchemaError> {
        Self::from_json(TRANSACTION_SCHEMA_JSON)
    }

    /// Validate one record, collecting every validator message.
    pub fn validate(&self, record: &Value) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(record)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate each record in order, stopping at the first failure.
    pub fn validate_all(&self, records: &[Value]) -> Result<(), SchemaViolation> {
        if records.is_empty() {
            return Err(SchemaViolation::Empty);
        }

        for (index, record) in records.iter().enumerate() {
            self.validate(record)
                .map_err(|messages| SchemaViolation::Mismatch { index, messages })?;
        }

        Ok(())
    }

    /// Check if a record is valid without collecting messages.
    pub fn is_valid(&self, record: &Value) -> bool {
        self.validator.is_valid(record)
    }
}
