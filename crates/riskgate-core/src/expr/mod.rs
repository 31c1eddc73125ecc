//! Sandboxed evaluation of rule conditions.
//!
//! A condition is lexed, parsed and interpreted against an
//! [`EvaluationContext`]. The only reachable names are the context bindings
//! (`transaction`, `history`, `now`, `today`) and a fixed table of helper
//! functions; there is no assignment, looping or access to the host.
//!
//! The outcome is an [`Evaluation`]: either the condition produced a
//! boolean, or it could not be evaluated and the caller should consult the
//! oracle instead. Failures never escape as errors.
//!
//! ```
//! use riskgate_core::expr::{Evaluation, EvaluationContext, Sandbox};
//! use serde_json::json;
//!
//! let ctx = EvaluationContext::new(json!({"amount": 1500}), vec![]);
//! let sandbox = Sandbox::default();
//!
//! assert_eq!(
//!     sandbox.try_evaluate("transaction['amount'] > 1000", &ctx),
//!     Evaluation::Valid(true)
//! );
//! assert!(!sandbox.try_evaluate("looks suspicious", &ctx).is_valid());
//! ```

mod builtins;
mod context;
mod interp;
mod lexer;
mod parser;
mod value;

pub use context::EvaluationContext;
pub use value::{Builtin, Value};

use interp::Interpreter;
use lexer::Lexer;
use parser::Parser;
use thiserror::Error;

/// Why a condition could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error at {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("empty condition")]
    Empty,

    #[error("condition is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("condition nests deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("missing key '{0}'")]
    MissingKey(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{function}() takes {expected} arguments, {found} given")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("date arithmetic overflow")]
    Overflow,
}

/// Result of trying a condition in the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The condition evaluated; the flag is its truthiness.
    Valid(bool),
    /// The condition is not a checkable expression over this context.
    NotEvaluable(EvalError),
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

impl From<Result<bool, EvalError>> for Evaluation {
    fn from(result: Result<bool, EvalError>) -> Self {
        match result {
            Ok(matched) => Self::Valid(matched),
            Err(err) => Self::NotEvaluable(err),
        }
    }
}

/// Bounds applied before and during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub max_source_len: usize,
    pub max_depth: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_source_len: 4096,
            max_depth: 64,
        }
    }
}

/// Stateless condition evaluator, safe to share across requests.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Evaluate a condition, folding every failure into `NotEvaluable`.
    pub fn try_evaluate(&self, condition: &str, ctx: &EvaluationContext) -> Evaluation {
        self.evaluate(condition, ctx).into()
    }

    /// Evaluate a condition to its truthiness.
    pub fn evaluate(&self, condition: &str, ctx: &EvaluationContext) -> Result<bool, EvalError> {
        let source = condition.trim();
        if source.is_empty() {
            return Err(EvalError::Empty);
        }
        if source.len() > self.limits.max_source_len {
            return Err(EvalError::TooLong {
                len: source.len(),
                max: self.limits.max_source_len,
            });
        }

        let tokens = Lexer::new(source).tokenize()?;
        let expr = Parser::new(tokens, self.limits.max_depth).parse()?;
        let value = Interpreter::new(ctx).eval(&expr)?;
        Ok(value.truthy())
    }
}

/// Evaluate with default limits.
pub fn try_evaluate(condition: &str, ctx: &EvaluationContext) -> Evaluation {
    Sandbox::default().try_evaluate(condition, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(
            json!({"amount": 1500, "currency": "USD", "tags": []}),
            vec![json!({"amount": 10})],
        )
    }

    #[test]
    fn test_expression_rule_is_valid() {
        assert_eq!(
            try_evaluate("transaction['amount'] > 1000", &ctx()),
            Evaluation::Valid(true)
        );
        assert_eq!(
            try_evaluate("transaction['currency'] == 'EUR'", &ctx()),
            Evaluation::Valid(false)
        );
    }

    #[test]
    fn test_natural_language_is_not_evaluable() {
        for condition in [
            "looks suspicious",
            "The customer's spending pattern changed abruptly",
            "merchant is a known gambling site",
        ] {
            assert!(
                !try_evaluate(condition, &ctx()).is_valid(),
                "{condition} should not evaluate"
            );
        }
    }

    #[test]
    fn test_results_are_coerced_to_truthiness() {
        assert_eq!(try_evaluate("transaction['tags']", &ctx()), Evaluation::Valid(false));
        assert_eq!(try_evaluate("history", &ctx()), Evaluation::Valid(true));
        assert_eq!(try_evaluate("None", &ctx()), Evaluation::Valid(false));
    }

    #[test]
    fn test_empty_and_oversized_conditions() {
        assert_eq!(try_evaluate("   ", &ctx()), Evaluation::NotEvaluable(EvalError::Empty));

        let long = format!("1 == 1{}", " and True".repeat(600));
        assert!(matches!(
            try_evaluate(&long, &ctx()),
            Evaluation::NotEvaluable(EvalError::TooLong { max: 4096, .. })
        ));
    }

    #[test]
    fn test_failure_does_not_leak_into_next_call() {
        let sandbox = Sandbox::default();
        let ctx = ctx();
        assert!(!sandbox.try_evaluate("undefined_name > 1", &ctx).is_valid());
        assert_eq!(
            sandbox.try_evaluate("len(history) == 1", &ctx),
            Evaluation::Valid(true)
        );
    }

    #[test]
    fn test_no_host_escape() {
        for condition in [
            "__import__('os').system('ls')",
            "open('/etc/passwd')",
            "transaction.__class__",
            "eval('1')",
        ] {
            assert!(!try_evaluate(condition, &ctx()).is_valid(), "{condition}");
        }
    }

    #[test]
    fn test_custom_limits() {
        let sandbox = Sandbox::new(SandboxLimits {
            max_source_len: 8,
            max_depth: 2,
        });
        assert!(matches!(
            sandbox.try_evaluate("1 + 2 + 3 + 4", &ctx()),
            Evaluation::NotEvaluable(EvalError::TooLong { .. })
        ));
        assert!(matches!(
            sandbox.try_evaluate("((1))", &ctx()),
            Evaluation::NotEvaluable(EvalError::TooDeep { max: 2 })
        ));
    }
}
