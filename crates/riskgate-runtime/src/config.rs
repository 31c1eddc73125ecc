//! Runtime configuration.
//!
//! Loaded once at startup from a YAML or JSON file; every field has a
//! default so an empty document is a valid configuration.
//!
//! ```yaml
//! oracle:
//!   endpoint: http://localhost:9090
//!   timeout: 30s
//!   sampling:
//!     n_predict: 8
//! evaluation:
//!   strategy: hybrid
//!   strict_justification: true
//!   ambiguous_answer: match
//! ```

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use riskgate_core::{SandboxLimits, Strategy};

use crate::oracle::AmbiguityPolicy;

/// Default completion endpoint (llamafile's conventional port).
pub const DEFAULT_ORACLE_ENDPOINT: &str = "http://localhost:9090";

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level runtime configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub oracle: OracleConfig,
    pub evaluation: EvaluationConfig,
}

/// Where and how to call the completion oracle.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    /// Base URL of the completion server
    pub endpoint: String,

    /// Optional bearer key; never printed
    #[serde(deserialize_with = "secret_opt")]
    pub api_key: Option<SecretString>,

    /// Bound on one oracle round trip, humantime syntax (`60s`, `2m`)
    #[serde(deserialize_with = "humantime_duration")]
    pub timeout: Duration,

    pub sampling: SamplingConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            sampling: SamplingConfig::default(),
        }
    }
}

/// Decoding parameters sent with every completion. The defaults make the
/// oracle as deterministic as the server allows.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub n_predict: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub min_p: f32,
    pub top_k: u32,
    pub stop: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            n_predict: 16,
            temperature: 0.0,
            top_p: 1.0,
            min_p: 0.0,
            top_k: 1,
            stop: ["</s>", "<|end|>", "<|endoftext|>", "###", "\nRule:"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Evaluation policy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    /// `hybrid` (sandbox first) or `oracle_only` for every request
    pub strategy: Strategy,

    /// List every checked rule in HIGH justifications
    pub strict_justification: bool,

    /// How to read an oracle answer with neither yes nor no
    pub ambiguous_answer: AmbiguityPolicy,

    pub max_condition_len: usize,
    pub max_depth: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            strategy: Strategy::Hybrid,
            strict_justification: false,
            ambiguous_answer: AmbiguityPolicy::NoMatch,
            max_condition_len: limits.max_source_len,
            max_depth: limits.max_depth,
        }
    }
}

impl EvaluationConfig {
    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            max_source_len: self.max_condition_len,
            max_depth: self.max_depth,
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml reads an empty document as null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; `.json` files are read as JSON, anything else as
    /// YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = &self.oracle.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "oracle.endpoint must start with http:// or https://, got '{}'",
                endpoint
            )));
        }
        if self.oracle.timeout.is_zero() {
            return Err(ConfigError::Invalid("oracle.timeout must be positive".into()));
        }
        if self.oracle.sampling.n_predict == 0 {
            return Err(ConfigError::Invalid("oracle.sampling.n_predict must be positive".into()));
        }
        if self.evaluation.max_condition_len == 0 || self.evaluation.max_depth == 0 {
            return Err(ConfigError::Invalid("evaluation limits must be positive".into()));
        }
        Ok(())
    }
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn secret_opt<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_yaml("").unwrap();
        assert_eq!(config.oracle.endpoint, DEFAULT_ORACLE_ENDPOINT);
        assert_eq!(config.oracle.timeout, Duration::from_secs(60));
        assert_eq!(config.oracle.sampling.temperature, 0.0);
        assert_eq!(config.oracle.sampling.top_k, 1);
        assert_eq!(config.oracle.sampling.n_predict, 16);
        assert!(config.oracle.sampling.stop.contains(&"###".to_string()));
        assert_eq!(config.evaluation.strategy, Strategy::Hybrid);
        assert_eq!(config.evaluation.ambiguous_answer, AmbiguityPolicy::NoMatch);
        assert_eq!(config.evaluation.sandbox_limits(), SandboxLimits::default());
    }

    #[test]
    fn test_yaml_overrides() {
        let config = RuntimeConfig::from_yaml(
            r#"
oracle:
  endpoint: https://oracle.internal:8443
  api_key: sk-test
  timeout: 1m 30s
  sampling:
    n_predict: 4
    stop: ["\n"]
evaluation:
  strategy: oracle_only
  strict_justification: true
  ambiguous_answer: match
"#,
        )
        .unwrap();

        assert_eq!(config.oracle.timeout, Duration::from_secs(90));
        assert_eq!(config.oracle.sampling.n_predict, 4);
        assert_eq!(config.oracle.sampling.top_k, 1);
        assert_eq!(config.oracle.sampling.stop, vec!["\n".to_string()]);
        assert_eq!(
            config.oracle.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert_eq!(config.evaluation.strategy, Strategy::OracleOnly);
        assert!(config.evaluation.strict_justification);
        assert_eq!(config.evaluation.ambiguous_answer, AmbiguityPolicy::Match);
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let config = RuntimeConfig::from_json(r#"{"oracle": {"api_key": "sk-hidden-123"}}"#).unwrap();
        assert!(!format!("{:?}", config).contains("sk-hidden-123"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            RuntimeConfig::from_yaml("oracle:\n  endpoint: localhost:9090\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("oracle:\n  timeout: soon\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("evaluation:\n  strategy: sometimes\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("unknown_section: {}\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"oracle": {"timeout": "0s"}}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RuntimeConfig::from_file("/nonexistent/riskgate.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
