//! Evaluation orchestrator.
//!
//! The orchestrator owns one scoring request from payload to verdict:
//! - Normalize the payload into a [`Subject`]
//! - Validate every record against the schema to pick a [`Strategy`]
//! - Visit each rule once, in order (sandbox first on the hybrid path)
//! - Aggregate the outcomes
//!
//! Rules are evaluated sequentially and every oracle call is awaited before
//! the next rule starts. An oracle failure aborts the request.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use riskgate_core::{
    Assessment, Evaluation, EvaluationContext, Method, RecordSchema, Rule, RuleOutcome, RuleSet,
    Sandbox, Strategy, Subject,
};

use crate::config::EvaluationConfig;
use crate::oracle::{Oracle, OracleError, RenderedContext};

/// Errors from the runtime orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Oracle failed on rule {index} ('{message}'): {source}")]
    Oracle {
        index: usize,
        message: String,
        #[source]
        source: OracleError,
    },

    #[error("Orchestrator not configured: {0}")]
    NotConfigured(String),
}

/// Scores requests against a shared rule set.
///
/// All state is immutable after construction, so one orchestrator serves
/// concurrent requests without locking.
#[derive(Debug)]
pub struct RiskOrchestrator {
    rules: Arc<RuleSet>,
    schema: Arc<RecordSchema>,
    oracle: Arc<Oracle>,
    sandbox: Sandbox,
    config: EvaluationConfig,
}

impl RiskOrchestrator {
    pub fn builder() -> RiskOrchestratorBuilder {
        RiskOrchestratorBuilder::new()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    /// Score a request payload, evaluating time-based rules against the
    /// current time.
    pub async fn score(&self, data: Value) -> Result<Assessment, RuntimeError> {
        self.score_at(data, Utc::now()).await
    }

    /// Score a request payload with `now` fixed to the given instant.
    pub async fn score_at(
        &self,
        data: Value,
        now: DateTime<Utc>,
    ) -> Result<Assessment, RuntimeError> {
        let subject = Subject::new(data);
        let strategy = self.select_strategy(&subject);

        let outcomes = match (strategy, subject.split()) {
            (Strategy::Hybrid, Some((current, history))) => {
                let ctx = EvaluationContext::at(current.clone(), history.to_vec(), now);
                self.evaluate_hybrid(&ctx).await?
            }
            // Unsplit original payload; the sandbox is never consulted.
            _ => {
                let rendered = RenderedContext::data(subject.original());
                self.evaluate_oracle_only(&rendered).await?
            }
        };

        let assessment = Assessment::new(strategy, outcomes, self.config.strict_justification);
        tracing::info!(
            strategy = %assessment.strategy,
            score = ?assessment.verdict.score,
            rules = assessment.outcomes.len(),
            matched = assessment.matched().count(),
            oracle_calls = assessment.count_by(Method::Oracle),
            "Request scored"
        );
        Ok(assessment)
    }

    fn select_strategy(&self, subject: &Subject) -> Strategy {
        if self.config.strategy == Strategy::OracleOnly {
            return Strategy::OracleOnly;
        }
        match self.schema.validate_all(subject.records()) {
            Ok(()) => Strategy::Hybrid,
            Err(violation) => {
                tracing::warn!(%violation, "Schema validation failed, routing every rule to the oracle");
                Strategy::OracleOnly
            }
        }
    }

    async fn evaluate_hybrid(
        &self,
        ctx: &EvaluationContext,
    ) -> Result<Vec<RuleOutcome>, RuntimeError> {
        // Rendered lazily: only rules the sandbox cannot decide need it.
        let mut rendered: Option<RenderedContext> = None;
        let mut outcomes = Vec::with_capacity(self.rules.len());

        for (index, rule) in self.rules.iter().enumerate() {
            let outcome = match self.sandbox.try_evaluate(&rule.condition, ctx) {
                Evaluation::Valid(matched) => {
                    tracing::debug!(index, matched, "Rule evaluated deterministically");
                    outcome(index, rule, Method::Deterministic, matched)
                }
                Evaluation::NotEvaluable(reason) => {
                    tracing::debug!(index, %reason, "Rule not evaluable, asking oracle");
                    let context = rendered.get_or_insert_with(|| {
                        RenderedContext::record(ctx.transaction(), ctx.history())
                    });
                    let matched = self.ask_oracle(index, rule, context).await?;
                    outcome(index, rule, Method::Oracle, matched)
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn evaluate_oracle_only(
        &self,
        rendered: &RenderedContext,
    ) -> Result<Vec<RuleOutcome>, RuntimeError> {
        let mut outcomes = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            let matched = self.ask_oracle(index, rule, rendered).await?;
            outcomes.push(outcome(index, rule, Method::Oracle, matched));
        }
        Ok(outcomes)
    }

    async fn ask_oracle(
        &self,
        index: usize,
        rule: &Rule,
        context: &RenderedContext,
    ) -> Result<bool, RuntimeError> {
        let answer = self
            .oracle
            .ask_rule(context, &rule.condition)
            .await
            .map_err(|source| {
                tracing::error!(index, error = %source, "Oracle call failed");
                RuntimeError::Oracle {
                    index,
                    message: rule.message.clone(),
                    source,
                }
            })?;
        let matched = self.config.ambiguous_answer.resolve(answer);
        if answer.is_none() {
            tracing::warn!(
                index,
                policy = ?self.config.ambiguous_answer,
                matched,
                "Ambiguous oracle reply settled by policy"
            );
        }
        tracing::debug!(index, matched, "Rule judged by oracle");
        Ok(matched)
    }
}

fn outcome(index: usize, rule: &Rule, method: Method, matched: bool) -> RuleOutcome {
    RuleOutcome {
        index,
        message: rule.message.clone(),
        condition: rule.condition.clone(),
        method,
        matched,
    }
}

/// Builder for RiskOrchestrator.
///
/// Rules and oracle are required; the schema defaults to the embedded
/// transaction schema.
pub struct RiskOrchestratorBuilder {
    rules: Option<Arc<RuleSet>>,
    schema: Option<Arc<RecordSchema>>,
    oracle: Option<Arc<Oracle>>,
    config: EvaluationConfig,
}

impl RiskOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            rules: None,
            schema: None,
            oracle: None,
            config: EvaluationConfig::default(),
        }
    }

    pub fn rules(mut self, rules: Arc<RuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn schema(mut self, schema: Arc<RecordSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn oracle(mut self, oracle: Arc<Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Set the evaluation policy.
    pub fn config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<RiskOrchestrator, RuntimeError> {
        let rules = self
            .rules
            .ok_or_else(|| RuntimeError::NotConfigured("No rule set".to_string()))?;
        let oracle = self
            .oracle
            .ok_or_else(|| RuntimeError::NotConfigured("No oracle".to_string()))?;
        let schema = match self.schema {
            Some(schema) => schema,
            None => Arc::new(
                RecordSchema::transaction()
                    .map_err(|e| RuntimeError::NotConfigured(e.to_string()))?,
            ),
        };

        Ok(RiskOrchestrator {
            rules,
            schema,
            oracle,
            sandbox: Sandbox::new(self.config.sandbox_limits()),
            config: self.config,
        })
    }
}

impl Default for RiskOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
