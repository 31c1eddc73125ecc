//! Rule store loading and validation.
//!
//! A rule store is an ordered list of `{condition, message}` objects under a
//! `rules` key, written as YAML or JSON. It is loaded once at startup.

mod store;

pub use store::{Rule, RuleSet, RuleStoreError};
