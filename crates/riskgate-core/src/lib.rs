//! # riskgate-core
//!
//! Deterministic building blocks of the riskgate rule engine.
//!
//! This crate answers, without any network I/O:
//! - Does the request data have the expected shape?
//! - Which rule conditions can be checked mechanically, and what do they say?
//! - What text may be shown to an external oracle?
//! - What verdict do the per-rule outcomes add up to?
//!
//! ## Key Guarantees
//!
//! 1. **Bounded**: conditions see a fixed set of bindings and helpers, never
//!    host functionality
//! 2. **Total**: a condition either evaluates or is reported as
//!    [`Evaluation::NotEvaluable`]; the sandbox never fails a request
//! 3. **Redacted**: rendered text omits identifier and hash fields
//!
//! ## Example
//!
//! ```rust
//! use riskgate_core::{EvaluationContext, Evaluation, Sandbox, Subject};
//! use serde_json::json;
//!
//! let subject = Subject::new(json!([{"amount": 1500}, {"amount": 20}]));
//! let (current, history) = subject.split().unwrap();
//! let ctx = EvaluationContext::new(current.clone(), history.to_vec());
//!
//! let outcome = Sandbox::default().try_evaluate("transaction['amount'] > 1000", &ctx);
//! assert_eq!(outcome, Evaluation::Valid(true));
//! ```

pub mod expr;
pub mod record;
pub mod render;
pub mod rules;
pub mod schema;
pub mod verdict;

// Re-export main types at crate root
pub use expr::{EvalError, Evaluation, EvaluationContext, Sandbox, SandboxLimits};
pub use record::{Record, Subject};
pub use render::render;
pub use rules::{Rule, RuleSet, RuleStoreError};
pub use schema::{RecordSchema, SchemaError, SchemaViolation};
pub use verdict::{
    aggregate, Assessment, Method, RuleOutcome, Score, Strategy, Verdict, NO_RULES_APPLIED,
};
