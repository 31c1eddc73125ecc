//! Verdict aggregation.
//!
//! The aggregation policy is fixed:
//! 1. If ANY rule matched → score is HIGH and the justification names every
//!    matched rule in rule-set order
//! 2. Else → score is LOW with the text [`NO_RULES_APPLIED`]
//!
//! Rule order only affects how the justification reads.

use serde::{Deserialize, Serialize};

/// Justification for a verdict with no matching rules.
pub const NO_RULES_APPLIED: &str = "No rules applied.";

/// Risk score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    High,
    Low,
}

/// The response body of a scoring request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub score: Score,
    pub justification: String,
}

/// How a rule's outcome was decided.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Evaluated in the sandbox
    Deterministic,
    /// Judged by the completion oracle
    Oracle,
}

/// Which evaluation path a request took.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Sandbox first, oracle for conditions the sandbox cannot evaluate
    #[default]
    Hybrid,
    /// Every rule goes to the oracle
    OracleOnly,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hybrid => write!(f, "hybrid"),
            Self::OracleOnly => write!(f, "oracle_only"),
        }
    }
}

/// Outcome of one rule within a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleOutcome {
    /// Position in the rule set
    pub index: usize,
    pub message: String,
    pub condition: String,
    pub method: Method,
    pub matched: bool,
}

/// Full result of scoring one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub verdict: Verdict,
    pub strategy: Strategy,
    pub outcomes: Vec<RuleOutcome>,
}

impl Assessment {
    /// Aggregate outcomes gathered under `strategy`.
    pub fn new(strategy: Strategy, outcomes: Vec<RuleOutcome>, strict: bool) -> Self {
        Self {
            verdict: aggregate(&outcomes, strict),
            strategy,
            outcomes,
        }
    }

    pub fn matched(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| o.matched)
    }

    pub fn count_by(&self, method: Method) -> usize {
        self.outcomes.iter().filter(|o| o.method == method).count()
    }
}

/// Reduce per-rule outcomes to a verdict.
///
/// In strict mode a HIGH justification also lists every rule checked, with
/// how it was decided.
pub fn aggregate(outcomes: &[RuleOutcome], strict: bool) -> Verdict {
    let matched: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.matched)
        .map(|o| o.message.as_str())
        .collect();

    if matched.is_empty() {
        return Verdict {
            score: Score::Low,
            justification: NO_RULES_APPLIED.to_string(),
        };
    }

    let mut justification = format!("Rules applied: {}.", matched.join("; "));
    if strict {
        let checked: Vec<String> = outcomes
            .iter()
            .map(|o| {
                let method = match o.method {
                    Method::Deterministic => "deterministic",
                    Method::Oracle => "oracle",
                };
                let result = if o.matched { "matched" } else { "not matched" };
                format!("{} ({}, {})", o.message, method, result)
            })
            .collect();
        justification.push_str(&format!(" Rules checked: {}.", checked.join("; ")));
    }

    Verdict {
        score: Score::High,
        justification,
    }
}
