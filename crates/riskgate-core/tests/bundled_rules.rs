//! The rule store shipped in `rules/` must load, and its expression rules
//! must evaluate against a schema-valid transaction.

use chrono::{TimeZone, Utc};
use riskgate_core::{Evaluation, EvaluationContext, RecordSchema, RuleSet, Sandbox, Subject};
use serde_json::json;

const RULES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../rules");

#[test]
fn bundled_rules_split_between_sandbox_and_oracle() {
    let rules = RuleSet::from_path(RULES_DIR).unwrap();
    let schema = RecordSchema::transaction().unwrap();

    let subject = Subject::new(json!([
        {
            "transaction_id": "tx-1",
            "amount": 20000,
            "currency": "JPY",
            "timestamp": "2024-05-01T03:00:00Z",
            "merchant": {"name": "Lucky Spins", "category": "gaming"}
        },
        {"amount": 100, "currency": "USD", "timestamp": "2024-04-28T12:00:00Z"}
    ]));
    assert!(schema.validate_all(subject.records()).is_ok());

    let (current, history) = subject.split().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
    let ctx = EvaluationContext::at(current.clone(), history.to_vec(), now);
    let sandbox = Sandbox::default();

    let outcomes: Vec<Option<bool>> = rules
        .iter()
        .map(|rule| match sandbox.try_evaluate(&rule.condition, &ctx) {
            Evaluation::Valid(matched) => Some(matched),
            Evaluation::NotEvaluable(_) => None,
        })
        .collect();

    assert_eq!(
        outcomes,
        vec![
            Some(true),  // amount above 10,000
            Some(true),  // JPY
            Some(false), // one day old
            Some(true),  // 200x the previous amount
            Some(true),  // 03:00 UTC
            None,
            None,
        ]
    );
}
