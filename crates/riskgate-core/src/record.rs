//! Request payload normalization.
//!
//! A scoring request carries either a single record or a sequence of records
//! (current first, then history). Both shapes are normalized into a
//! [`Subject`] before validation.

use serde_json::Value;

/// A single data record (JSON-like tree).
pub type Record = Value;

/// The normalized subject of one scoring request.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    original: Value,
    records: Vec<Record>,
}

impl Subject {
    /// Normalize a request payload.
    ///
    /// Arrays are taken as the record sequence; any other value is wrapped
    /// into a one-element sequence.
    pub fn new(data: Value) -> Self {
        let records = match &data {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        Self {
            original: data,
            records,
        }
    }

    /// The payload exactly as supplied.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// All records, current first.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Split into the current record and its history.
    ///
    /// Returns `None` for an empty sequence.
    pub fn split(&self) -> Option<(&Record, &[Record])> {
        self.records.split_first()
    }
}

impl From<Value> for Subject {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}
