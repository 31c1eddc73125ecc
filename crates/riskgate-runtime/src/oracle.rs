//! Oracle adapter: asks the completion service whether one rule applies.
//!
//! Each call renders a prompt, awaits one completion, and reads the first
//! standalone `yes` or `no` in the reply. A reply with neither is returned as
//! `None` and settled by the caller's [`AmbiguityPolicy`]. There is no retry;
//! transport failures and timeouts are returned to the caller.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use riskgate_core::render;

use crate::config::{OracleConfig, SamplingConfig};
use crate::prompts;
use crate::providers::{CompletionProvider, CompletionRequest, ProviderError};

lazy_static! {
    static ref ANSWER_PATTERN: Regex = Regex::new(r"\b(yes|no)\b").unwrap();
}

/// Errors from an oracle call.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Oracle did not answer within {0:?}")]
    Timeout(Duration),
}

/// How to read a reply that contains neither `yes` nor `no`.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Treat the rule as not applying
    #[default]
    NoMatch,
    /// Treat the rule as applying (fail-safe risk flagging)
    Match,
}

impl AmbiguityPolicy {
    /// Settle an oracle answer; `None` means the reply had no yes/no.
    pub fn resolve(self, answer: Option<bool>) -> bool {
        answer.unwrap_or(self == AmbiguityPolicy::Match)
    }
}

/// Redacted text shown to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedContext {
    /// A schema-valid request split into current record and history.
    Record {
        transaction: String,
        history: Option<String>,
    },
    /// The unsplit original payload.
    Data(String),
}

impl RenderedContext {
    /// Render a current record and its history. An empty history is
    /// omitted from the prompt.
    pub fn record(current: &Value, history: &[Value]) -> Self {
        let history = if history.is_empty() {
            None
        } else {
            Some(render::render(&Value::Array(history.to_vec())))
        };
        Self::Record {
            transaction: render::render(current),
            history,
        }
    }

    /// Render a payload as a single data block.
    pub fn data(original: &Value) -> Self {
        Self::Data(render::render(original))
    }

    fn prompt(&self, condition: &str) -> String {
        match self {
            Self::Record {
                transaction,
                history,
            } => prompts::rule_prompt(transaction, history.as_deref(), condition),
            Self::Data(data) => prompts::data_prompt(data, condition),
        }
    }
}

/// Read the first standalone yes/no in a reply, case-insensitively.
pub fn parse_answer(content: &str) -> Option<bool> {
    let content = content.to_lowercase();
    ANSWER_PATTERN
        .captures(&content)
        .map(|caps| &caps[1] == "yes")
}

/// Completion-backed rule judge.
pub struct Oracle {
    provider: Arc<dyn CompletionProvider>,
    sampling: SamplingConfig,
    timeout: Duration,
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("provider", &self.provider.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Oracle {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &OracleConfig) -> Self {
        Self {
            provider,
            sampling: config.sampling.clone(),
            timeout: config.timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Whether the backing service is reachable.
    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }

    /// Ask whether `condition` applies to the rendered data.
    ///
    /// `Ok(None)` means the oracle replied without a yes or no.
    pub async fn ask_rule(
        &self,
        context: &RenderedContext,
        condition: &str,
    ) -> Result<Option<bool>, OracleError> {
        let request = CompletionRequest {
            prompt: context.prompt(condition),
            n_predict: self.sampling.n_predict,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            min_p: self.sampling.min_p,
            top_k: self.sampling.top_k,
            stop: self.sampling.stop.clone(),
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;

        let answer = parse_answer(&response.content);
        match answer {
            Some(answer) => {
                tracing::debug!(provider = self.provider.name(), answer, "Oracle answered")
            }
            None => tracing::warn!(
                provider = self.provider.name(),
                reply = %response.content.trim(),
                "Oracle reply had no yes/no"
            ),
        }
        Ok(answer)
    }
}
