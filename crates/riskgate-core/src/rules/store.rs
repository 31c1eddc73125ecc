//! Rule store parsing from YAML/JSON, or one plain-text rule per file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading a rule store.
#[derive(Error, Debug)]
pub enum RuleStoreError {
    #[error("Failed to read rule store {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported rule file extension: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Rule store validation failed: {0}")]
    ValidationError(String),
}

/// A single rule: a condition and the label reported when it applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Boolean expression or natural-language criterion
    pub condition: String,

    /// Human-facing label emitted when the rule is judged to apply
    pub message: String,
}

impl Rule {
    pub fn new(condition: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            message: message.into(),
        }
    }
}

/// An ordered set of rules.
///
/// Order is kept for reporting only; every rule is checked on every request.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Parse a rule store from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleStoreError> {
        let set: RuleSet = serde_yaml::from_str(yaml)?;
        set.validate()?;
        Ok(set)
    }

    /// Parse a rule store from JSON string.
    pub fn from_json(json: &str) -> Result<Self, RuleStoreError> {
        let set: RuleSet = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    /// Load a rule store from a file or a directory of rule files.
    ///
    /// A directory loads every `.json`, `.yaml`, `.yml` and `.txt` file in
    /// file-name order and concatenates their rules. A `.txt` file holds one
    /// rule: its trimmed body is the condition and its file stem the message.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuleStoreError> {
        let path = path.as_ref();
        let set = if path.is_dir() {
            let mut files = fs::read_dir(path)
                .map_err(|source| RuleStoreError::IoError {
                    path: path.to_path_buf(),
                    source,
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && rule_format(p).is_some())
                .collect::<Vec<_>>();
            files.sort();

            let mut rules = Vec::new();
            for file in &files {
                rules.extend(Self::parse_file(file)?.rules);
            }
            tracing::debug!(dir = %path.display(), files = files.len(), "Loaded rule directory");
            Self { rules }
        } else {
            Self::parse_file(path)?
        };

        set.validate()?;
        Ok(set)
    }

    fn parse_file(path: &Path) -> Result<Self, RuleStoreError> {
        let format =
            rule_format(path).ok_or_else(|| RuleStoreError::UnsupportedFormat(path.to_path_buf()))?;
        let contents = fs::read_to_string(path).map_err(|source| RuleStoreError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let set = match format {
            RuleFormat::Json => serde_json::from_str(&contents)?,
            RuleFormat::Yaml => serde_yaml::from_str(&contents)?,
            RuleFormat::Text => {
                let message = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or_default();
                Self {
                    rules: vec![Rule::new(contents.trim(), message)],
                }
            }
        };
        Ok(set)
    }

    /// Validate the rule store structure.
    fn validate(&self) -> Result<(), RuleStoreError> {
        if self.rules.is_empty() {
            return Err(RuleStoreError::ValidationError(
                "rule store contains no rules".to_string(),
            ));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.message.trim().is_empty() {
                return Err(RuleStoreError::ValidationError(format!(
                    "rule {} has an empty message",
                    index
                )));
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[derive(Debug, Clone, Copy)]
enum RuleFormat {
    Json,
    Yaml,
    Text,
}

fn rule_format(path: &Path) -> Option<RuleFormat> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "json" => Some(RuleFormat::Json),
        "yaml" | "yml" => Some(RuleFormat::Yaml),
        "txt" => Some(RuleFormat::Text),
        _ => None,
    }
}
