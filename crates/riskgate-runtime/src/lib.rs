//! # riskgate-runtime
//!
//! Oracle-assisted rule evaluation for riskgate.
//!
//! `riskgate-core` decides every rule it can evaluate deterministically.
//! This crate adds the part that needs a language model: rules written in
//! prose, and requests whose data does not match the record schema, are
//! sent one at a time to a completion oracle that answers yes or no.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use riskgate_core::{RecordSchema, RuleSet};
//! use riskgate_runtime::{LlamafileProvider, Oracle, RiskOrchestrator, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("riskgate.yaml")?;
//! let provider = LlamafileProvider::new(&config.oracle.endpoint, config.oracle.timeout)?;
//! let oracle = Oracle::new(Arc::new(provider), &config.oracle);
//!
//! let orchestrator = RiskOrchestrator::builder()
//!     .rules(Arc::new(RuleSet::from_path("rules/")?))
//!     .schema(Arc::new(RecordSchema::transaction()?))
//!     .oracle(Arc::new(oracle))
//!     .config(config.evaluation)
//!     .build()?;
//!
//! let assessment = orchestrator.score(payload).await?;
//! println!("{:?}: {}", assessment.verdict.score, assessment.verdict.justification);
//! ```

pub mod config;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use config::{ConfigError, EvaluationConfig, OracleConfig, RuntimeConfig, SamplingConfig};
pub use oracle::{parse_answer, AmbiguityPolicy, Oracle, OracleError, RenderedContext};
pub use orchestrator::{RiskOrchestrator, RiskOrchestratorBuilder, RuntimeError};
pub use providers::{
    ApiCredential, CompletionProvider, CompletionRequest, CompletionResponse, CredentialSource,
    ProviderError, ORACLE_API_KEY_ENV,
};

#[cfg(feature = "llamafile")]
pub use providers::LlamafileProvider;
