//! Helper functions and methods callable from conditions.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use std::cmp::Ordering;

use super::value::{Builtin, Value};
use super::EvalError;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn call(builtin: Builtin, args: &[Value]) -> Result<Value, EvalError> {
    match builtin {
        Builtin::Len => {
            let [value] = exact::<1>(builtin, args)?;
            let len = match value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(map) => map.len(),
                other => return Err(type_error(builtin, other)),
            };
            Ok(Value::Number(len as f64))
        }
        Builtin::Abs => match exact::<1>(builtin, args)? {
            [Value::Number(n)] => Ok(Value::Number(n.abs())),
            [Value::Duration(d)] => Ok(Value::Duration(d.abs())),
            [other] => Err(type_error(builtin, other)),
        },
        Builtin::Min => extreme(builtin, args, Ordering::Less),
        Builtin::Max => extreme(builtin, args, Ordering::Greater),
        Builtin::Sum => {
            arity(builtin, args, 1, 2)?;
            let items = as_list(builtin, &args[0])?;
            let start = args.get(1).map(Value::as_number).transpose()?.unwrap_or(0.0);
            items
                .iter()
                .try_fold(start, |acc, item| -> Result<f64, EvalError> {
                    Ok(acc + item.as_number()?)
                })
                .map(Value::Number)
        }
        Builtin::Any => {
            let [value] = exact::<1>(builtin, args)?;
            Ok(Value::Bool(as_list(builtin, value)?.iter().any(Value::truthy)))
        }
        Builtin::All => {
            let [value] = exact::<1>(builtin, args)?;
            Ok(Value::Bool(as_list(builtin, value)?.iter().all(Value::truthy)))
        }
        Builtin::Float => {
            let [value] = exact::<1>(builtin, args)?;
            to_number(builtin, value).map(Value::Number)
        }
        Builtin::Int => {
            let [value] = exact::<1>(builtin, args)?;
            to_number(builtin, value).map(|n| Value::Number(n.trunc()))
        }
        Builtin::Str => {
            let [value] = exact::<1>(builtin, args)?;
            Ok(Value::Str(value.to_string()))
        }
        Builtin::Lower => {
            let [value] = exact::<1>(builtin, args)?;
            Ok(Value::Str(value.as_str()?.to_lowercase()))
        }
        Builtin::Upper => {
            let [value] = exact::<1>(builtin, args)?;
            Ok(Value::Str(value.as_str()?.to_uppercase()))
        }
        Builtin::Pluck => {
            let [list, key] = exact::<2>(builtin, args)?;
            let key = key.as_str()?;
            // Elements without the key are skipped.
            let values = as_list(builtin, list)?
                .iter()
                .filter_map(|item| match item {
                    Value::Map(map) => map.get(key).map(Value::from_json),
                    _ => None,
                })
                .collect();
            Ok(Value::List(values))
        }
        Builtin::ParseDateTime => {
            let [value] = exact::<1>(builtin, args)?;
            match value {
                Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
                Value::Str(text) => parse_datetime(text).map(Value::DateTime),
                Value::Number(secs) => DateTime::from_timestamp_millis((secs * 1000.0) as i64)
                    .map(Value::DateTime)
                    .ok_or_else(|| EvalError::InvalidTimestamp(secs.to_string())),
                other => Err(type_error(builtin, other)),
            }
        }
        Builtin::Days => unit_duration(builtin, args, 86_400_000.0),
        Builtin::Hours => unit_duration(builtin, args, 3_600_000.0),
        Builtin::Minutes => unit_duration(builtin, args, 60_000.0),
    }
}

/// Methods on strings, mappings and durations. `None` means the receiver
/// has no method of that name.
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    let result = match (receiver, name) {
        (Value::Str(s), "lower") => no_args(name, args).map(|_| Value::Str(s.to_lowercase())),
        (Value::Str(s), "upper") => no_args(name, args).map(|_| Value::Str(s.to_uppercase())),
        (Value::Str(s), "strip") => no_args(name, args).map(|_| Value::Str(s.trim().to_string())),
        (Value::Str(s), "startswith") => {
            single_str(name, args).map(|prefix| Value::Bool(s.starts_with(prefix)))
        }
        (Value::Str(s), "endswith") => {
            single_str(name, args).map(|suffix| Value::Bool(s.ends_with(suffix)))
        }
        (Value::Map(map), "get") => match args {
            [Value::Str(key)] => Ok(map.get(key).map(Value::from_json).unwrap_or(Value::Null)),
            [Value::Str(key), default] => Ok(map
                .get(key)
                .map(Value::from_json)
                .unwrap_or_else(|| default.clone())),
            _ => Err(EvalError::Arity {
                function: "get".to_string(),
                expected: "1 or 2".to_string(),
                found: args.len(),
            }),
        },
        (Value::Duration(d), "total_seconds") => {
            no_args(name, args).map(|_| Value::Number(d.num_milliseconds() as f64 / 1000.0))
        }
        _ => return None,
    };
    Some(result)
}

/// Parse RFC 3339, naive ISO date-times or bare dates; naive values are UTC.
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>, EvalError> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| EvalError::InvalidTimestamp(text.to_string()))
}

pub fn millis_to_duration(millis: f64) -> Result<TimeDelta, EvalError> {
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(EvalError::Overflow);
    }
    TimeDelta::try_milliseconds(millis.round() as i64).ok_or(EvalError::Overflow)
}

fn unit_duration(builtin: Builtin, args: &[Value], unit_millis: f64) -> Result<Value, EvalError> {
    let [value] = exact::<1>(builtin, args)?;
    millis_to_duration(value.as_number()? * unit_millis).map(Value::Duration)
}

/// `min`/`max` over one list argument or over two or more arguments.
fn extreme(builtin: Builtin, args: &[Value], keep: Ordering) -> Result<Value, EvalError> {
    let candidates = match args {
        [] => return Err(arity_error(builtin, "at least 1", 0)),
        [single] => as_list(builtin, single)?,
        many => many,
    };
    let (first, rest) = candidates.split_first().ok_or_else(|| {
        EvalError::Type(format!("{}() arg is an empty sequence", builtin.name()))
    })?;
    rest.iter().try_fold(first.clone(), |best, item| -> Result<Value, EvalError> {
        Ok(if item.try_cmp(&best)? == keep {
            item.clone()
        } else {
            best
        })
    })
}

fn to_number(builtin: Builtin, value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            EvalError::Type(format!("{}() cannot convert '{}'", builtin.name(), s))
        }),
        other => Err(type_error(builtin, other)),
    }
}

fn as_list(builtin: Builtin, value: &Value) -> Result<&[Value], EvalError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(type_error(builtin, other)),
    }
}

fn exact<const N: usize>(builtin: Builtin, args: &[Value]) -> Result<&[Value; N], EvalError> {
    args.try_into()
        .map_err(|_| arity_error(builtin, &N.to_string(), args.len()))
}

fn arity(builtin: Builtin, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        return Err(arity_error(builtin, &format!("{} to {}", min, max), args.len()));
    }
    Ok(())
}

fn arity_error(builtin: Builtin, expected: &str, found: usize) -> EvalError {
    EvalError::Arity {
        function: builtin.name().to_string(),
        expected: expected.to_string(),
        found,
    }
}

fn type_error(builtin: Builtin, value: &Value) -> EvalError {
    EvalError::Type(format!(
        "{}() does not accept {}",
        builtin.name(),
        value.type_name()
    ))
}

fn no_args(method: &str, args: &[Value]) -> Result<(), EvalError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(EvalError::Arity {
            function: method.to_string(),
            expected: "0".to_string(),
            found: args.len(),
        })
    }
}

fn single_str<'v>(method: &str, args: &'v [Value]) -> Result<&'v str, EvalError> {
    match args {
        [value] => value.as_str(),
        _ => Err(EvalError::Arity {
            function: method.to_string(),
            expected: "1".to_string(),
            found: args.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn list(values: &[f64]) -> Value {
        Value::List(values.iter().copied().map(Value::Number).collect())
    }

    #[test]
    fn test_min_max_forms() {
        assert_eq!(call(Builtin::Max, &[list(&[3.0, 9.0, 4.0])]).unwrap(), Value::Number(9.0));
        assert_eq!(
            call(Builtin::Min, &[Value::Number(3.0), Value::Number(-1.0)]).unwrap(),
            Value::Number(-1.0)
        );
        assert!(matches!(call(Builtin::Max, &[list(&[])]), Err(EvalError::Type(_))));
        assert!(matches!(call(Builtin::Min, &[]), Err(EvalError::Arity { .. })));
    }

    #[test]
    fn test_sum_with_start() {
        assert_eq!(
            call(Builtin::Sum, &[list(&[1.0, 2.5]), Value::Number(10.0)]).unwrap(),
            Value::Number(13.5)
        );
        assert!(call(Builtin::Sum, &[Value::List(vec![Value::Str("x".into())])]).is_err());
    }

    #[test]
    fn test_pluck_skips_missing_keys() {
        let records = Value::from_json(&json!([{"amount": 1}, {"other": 2}, {"amount": 3}]));
        assert_eq!(
            call(Builtin::Pluck, &[records, Value::Str("amount".into())]).unwrap(),
            list(&[1.0, 3.0])
        );
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call(Builtin::Int, &[Value::Str("12.9".into())]).unwrap(), Value::Number(12.0));
        assert_eq!(call(Builtin::Float, &[Value::Bool(true)]).unwrap(), Value::Number(1.0));
        assert_eq!(call(Builtin::Str, &[Value::Number(7.0)]).unwrap(), Value::Str("7".into()));
        assert!(call(Builtin::Float, &[Value::Str("abc".into())]).is_err());
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_datetime("2024-05-01T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("2024-05-01T12:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-05-01 10:00:00").unwrap(), expected);
        assert_eq!(
            parse_datetime("2024-05-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
        assert!(matches!(parse_datetime("yesterday"), Err(EvalError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_durations() {
        assert_eq!(
            call(Builtin::Hours, &[Value::Number(1.5)]).unwrap(),
            Value::Duration(TimeDelta::minutes(90))
        );
        assert!(matches!(
            call(Builtin::Days, &[Value::Number(f64::INFINITY)]),
            Err(EvalError::Overflow)
        ));
    }

    #[test]
    fn test_methods() {
        let s = Value::Str("  Corner Shop ".into());
        assert_eq!(
            call_method(&s, "strip", &[]).unwrap().unwrap(),
            Value::Str("Corner Shop".into())
        );
        let map = Value::from_json(&json!({"a": 1}));
        assert_eq!(
            call_method(&map, "get", &[Value::Str("b".into()), Value::Number(0.0)])
                .unwrap()
                .unwrap(),
            Value::Number(0.0)
        );
        assert!(call_method(&Value::Number(1.0), "lower", &[]).is_none());
    }
}
