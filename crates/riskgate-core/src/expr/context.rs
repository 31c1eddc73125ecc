//! The fixed symbol table visible to rule conditions.

use chrono::{DateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;

use super::value::{Builtin, Value};

/// Bindings for one evaluation: the current record, its history and a
/// clock frozen at construction.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    transaction: JsonValue,
    history: Vec<JsonValue>,
    now: DateTime<Utc>,
}

impl EvaluationContext {
    /// Build a context with `now` taken from the system clock.
    pub fn new(transaction: JsonValue, history: Vec<JsonValue>) -> Self {
        Self::at(transaction, history, Utc::now())
    }

    /// Build a context with an explicit evaluation time.
    pub fn at(transaction: JsonValue, history: Vec<JsonValue>, now: DateTime<Utc>) -> Self {
        Self {
            transaction,
            history,
            now,
        }
    }

    pub fn transaction(&self) -> &JsonValue {
        &self.transaction
    }

    pub fn history(&self) -> &[JsonValue] {
        &self.history
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Midnight UTC of the evaluation date.
    pub fn today(&self) -> DateTime<Utc> {
        self.now
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    /// Resolve a free identifier. Anything not listed here is unknown.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "transaction" => Some(Value::from_json(&self.transaction)),
            "history" => Some(Value::List(
                self.history.iter().map(Value::from_json).collect(),
            )),
            "now" => Some(Value::DateTime(self.now)),
            "today" => Some(Value::DateTime(self.today())),
            other => Builtin::lookup(other).map(Value::Function),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_today_is_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 17, 45, 3).unwrap();
        let ctx = EvaluationContext::at(json!({}), vec![], now);
        assert_eq!(ctx.today(), Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_only_fixed_names_resolve() {
        let ctx = EvaluationContext::new(json!({"amount": 1}), vec![json!({"amount": 2})]);
        assert!(matches!(ctx.lookup("history"), Some(Value::List(ref h)) if h.len() == 1));
        assert!(matches!(ctx.lookup("len"), Some(Value::Function(Builtin::Len))));
        assert!(ctx.lookup("amount").is_none());
        assert!(ctx.lookup("__import__").is_none());
        assert!(ctx.lookup("open").is_none());
    }
}
