//! Runtime values for the sandbox.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::fmt;

use super::EvalError;

/// A value produced while evaluating a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    /// Mappings stay in JSON form; children convert on access.
    Map(Map<String, JsonValue>),
    DateTime(DateTime<Utc>),
    Duration(TimeDelta),
    Function(Builtin),
}

/// Helper functions reachable from rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Abs,
    Min,
    Max,
    Sum,
    Any,
    All,
    Float,
    Int,
    Str,
    Lower,
    Upper,
    Pluck,
    ParseDateTime,
    Days,
    Hours,
    Minutes,
}

impl Builtin {
    /// Resolve a helper by name. This table is the complete set of callable
    /// host functionality.
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "len" => Self::Len,
            "abs" => Self::Abs,
            "min" => Self::Min,
            "max" => Self::Max,
            "sum" => Self::Sum,
            "any" => Self::Any,
            "all" => Self::All,
            "float" => Self::Float,
            "int" => Self::Int,
            "str" => Self::Str,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "pluck" => Self::Pluck,
            "parse_datetime" | "fromisoformat" => Self::ParseDateTime,
            "days" => Self::Days,
            "hours" => Self::Hours,
            "minutes" => Self::Minutes,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Any => "any",
            Self::All => "all",
            Self::Float => "float",
            Self::Int => "int",
            Self::Str => "str",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Pluck => "pluck",
            Self::ParseDateTime => "parse_datetime",
            Self::Days => "days",
            Self::Hours => "hours",
            Self::Minutes => "minutes",
        }
    }
}

impl Value {
    /// Convert a JSON value; arrays convert eagerly, objects stay as maps.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Null),
            JsonValue::String(s) => Self::Str(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Map(map.clone()),
        }
    }

    /// Boolean coercion used for conditions and `and`/`or`/`not`.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::DateTime(_) | Self::Function(_) => true,
            Self::Duration(d) => !d.is_zero(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "None",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
            Self::DateTime(_) => "datetime",
            Self::Duration(_) => "duration",
            Self::Function(_) => "function",
        }
    }

    /// Equality as used by `==`, `!=` and `in`. Values of different kinds
    /// are never equal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`, `min` and `max`.
    pub fn try_cmp(&self, other: &Value) -> Result<Ordering, EvalError> {
        let ordering = match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Duration(a), Self::Duration(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => {
                return Err(EvalError::Type(format!(
                    "cannot order {} and {}",
                    self.type_name(),
                    other.type_name()
                )))
            }
        };
        ordering.ok_or_else(|| EvalError::Type("cannot order NaN".to_string()))
    }

    pub fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Self::Number(n) => Ok(*n),
            other => Err(EvalError::Type(format!(
                "expected number, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(EvalError::Type(format!(
                "expected str, found {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Map(map) => write!(f, "{}", JsonValue::Object(map.clone())),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Duration(d) => write!(f, "{}s", d.num_milliseconds() as f64 / 1000.0),
            Self::Function(b) => write!(f, "<function {}>", b.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Number(-2.0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(!Value::from_json(&json!({})).truthy());
        assert!(Value::from_json(&json!({"a": 1})).truthy());
        assert!(!Value::Duration(TimeDelta::zero()).truthy());
    }

    #[test]
    fn test_mixed_kinds_are_not_equal() {
        assert!(!Value::Number(1.0).loose_eq(&Value::Str("1".into())));
        assert!(!Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(Value::from_json(&json!([1, "a"])).loose_eq(&Value::from_json(&json!([1, "a"]))));
    }

    #[test]
    fn test_ordering_rejects_mixed_kinds() {
        assert!(Value::Number(1.0).try_cmp(&Value::Str("2".into())).is_err());
        assert_eq!(
            Value::Str("a".into()).try_cmp(&Value::Str("b".into())).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_display_integral_numbers() {
        assert_eq!(Value::Number(1500.0).to_string(), "1500");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }
}
