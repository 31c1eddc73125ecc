//! Tree-walking interpreter over a parsed condition.

use chrono::{Datelike, TimeDelta, Timelike};
use std::cmp::Ordering;

use super::builtins;
use super::context::EvaluationContext;
use super::parser::{ArithOp, CmpOp, Expr};
use super::value::Value;
use super::EvalError;

/// Evaluates expressions against one context. Holds no state of its own.
pub struct Interpreter<'a> {
    ctx: &'a EvaluationContext,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a EvaluationContext) -> Self {
        Self { ctx }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self
                .ctx
                .lookup(name)
                .ok_or_else(|| EvalError::UnknownIdentifier(name.clone())),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(&target, &index)
            }
            Expr::Attr { target, name } => {
                let target = self.eval(target)?;
                attribute(&target, name)
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Neg(operand) => match self.eval(operand)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                Value::Duration(d) => Ok(Value::Duration(-d)),
                other => Err(EvalError::Type(format!(
                    "bad operand for unary -: {}",
                    other.type_name()
                ))),
            },
            Expr::Not(operand) => Ok(Value::Bool(!self.eval(operand)?.truthy())),
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.truthy() {
                    self.eval(rhs)
                } else {
                    Ok(lhs)
                }
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.truthy() {
                    Ok(lhs)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Arith { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                arithmetic(*op, lhs, rhs)
            }
            Expr::Compare { first, rest } => {
                let mut lhs = self.eval(first)?;
                for (op, rhs) in rest {
                    let rhs = self.eval(rhs)?;
                    if !compare(*op, &lhs, &rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
        }
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> Result<Value, EvalError> {
        // `x.lower()` and friends dispatch on the receiver before falling
        // back to calling whatever the attribute holds.
        if let Expr::Attr { target, name } = callee {
            let receiver = self.eval(target)?;
            let args = self.eval_args(args)?;
            if let Some(result) = builtins::call_method(&receiver, name, &args) {
                return result;
            }
            let function = attribute(&receiver, name)?;
            return invoke(function, &args);
        }

        let function = self.eval(callee)?;
        let args = self.eval_args(args)?;
        invoke(function, &args)
    }

    fn eval_args(&self, args: &[Expr]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }
}

fn invoke(function: Value, args: &[Value]) -> Result<Value, EvalError> {
    match function {
        Value::Function(builtin) => builtins::call(builtin, args),
        other => Err(EvalError::NotCallable(other.type_name().to_string())),
    }
}

fn subscript(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::Map(map), Value::Str(key)) => map
            .get(key)
            .map(Value::from_json)
            .ok_or_else(|| EvalError::MissingKey(key.clone())),
        (Value::List(items), Value::Number(n)) => {
            let i = resolve_index(*n, items.len())?;
            Ok(items[i].clone())
        }
        (Value::Str(s), Value::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            let i = resolve_index(*n, chars.len())?;
            Ok(Value::Str(chars[i].to_string()))
        }
        (target, index) => Err(EvalError::Type(format!(
            "{} indices must match the container, got {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

/// Python-style index resolution: negative values count from the end.
fn resolve_index(n: f64, len: usize) -> Result<usize, EvalError> {
    if n.fract() != 0.0 {
        return Err(EvalError::Type(format!("index must be an integer, got {}", n)));
    }
    let index = n as i64;
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

fn attribute(target: &Value, name: &str) -> Result<Value, EvalError> {
    match target {
        Value::Map(map) => map
            .get(name)
            .map(Value::from_json)
            .ok_or_else(|| EvalError::MissingKey(name.to_string())),
        Value::DateTime(dt) => {
            let field = match name {
                "year" => dt.year() as f64,
                "month" => dt.month() as f64,
                "day" => dt.day() as f64,
                "hour" => dt.hour() as f64,
                "minute" => dt.minute() as f64,
                "second" => dt.second() as f64,
                "weekday" => dt.weekday().num_days_from_monday() as f64,
                _ => return Err(no_attribute(target, name)),
            };
            Ok(Value::Number(field))
        }
        Value::Duration(d) => {
            let millis = d.num_milliseconds();
            let field = match name {
                "days" => millis.div_euclid(86_400_000) as f64,
                "hours" => millis as f64 / 3_600_000.0,
                "minutes" => millis as f64 / 60_000.0,
                "seconds" => millis as f64 / 1000.0,
                _ => return Err(no_attribute(target, name)),
            };
            Ok(Value::Number(field))
        }
        _ => Err(no_attribute(target, name)),
    }
}

fn no_attribute(target: &Value, name: &str) -> EvalError {
    EvalError::Type(format!("{} has no attribute '{}'", target.type_name(), name))
}

fn arithmetic(op: ArithOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    use Value::{DateTime, Duration, List, Number, Str};

    let result = match (op, lhs, rhs) {
        (ArithOp::Add, Number(a), Number(b)) => Number(a + b),
        (ArithOp::Sub, Number(a), Number(b)) => Number(a - b),
        (ArithOp::Mul, Number(a), Number(b)) => Number(a * b),
        (ArithOp::Div, Number(a), Number(b)) => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Number(a / b)
        }
        (ArithOp::Rem, Number(a), Number(b)) => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            // Result takes the sign of the divisor.
            Number(a - b * (a / b).floor())
        }
        (ArithOp::Add, Str(a), Str(b)) => Str(a + &b),
        (ArithOp::Add, List(mut a), List(b)) => {
            a.extend(b);
            List(a)
        }
        (ArithOp::Add, DateTime(t), Duration(d)) | (ArithOp::Add, Duration(d), DateTime(t)) => {
            DateTime(t.checked_add_signed(d).ok_or(EvalError::Overflow)?)
        }
        (ArithOp::Sub, DateTime(t), Duration(d)) => {
            DateTime(t.checked_sub_signed(d).ok_or(EvalError::Overflow)?)
        }
        (ArithOp::Sub, DateTime(a), DateTime(b)) => Duration(a.signed_duration_since(b)),
        (ArithOp::Add, Duration(a), Duration(b)) => {
            Duration(a.checked_add(&b).ok_or(EvalError::Overflow)?)
        }
        (ArithOp::Sub, Duration(a), Duration(b)) => {
            Duration(a.checked_sub(&b).ok_or(EvalError::Overflow)?)
        }
        (ArithOp::Mul, Duration(d), Number(n)) | (ArithOp::Mul, Number(n), Duration(d)) => {
            Duration(scale_duration(d, n)?)
        }
        (ArithOp::Div, Duration(d), Number(n)) => {
            if n == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Duration(scale_duration(d, 1.0 / n)?)
        }
        (ArithOp::Div, Duration(a), Duration(b)) => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Number(a.num_milliseconds() as f64 / b.num_milliseconds() as f64)
        }
        (op, lhs, rhs) => {
            return Err(EvalError::Type(format!(
                "unsupported operand types for {:?}: {} and {}",
                op,
                lhs.type_name(),
                rhs.type_name()
            )))
        }
    };
    Ok(result)
}

fn scale_duration(d: TimeDelta, factor: f64) -> Result<TimeDelta, EvalError> {
    builtins::millis_to_duration(d.num_milliseconds() as f64 * factor)
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    let result = match op {
        CmpOp::Eq => lhs.loose_eq(rhs),
        CmpOp::Ne => !lhs.loose_eq(rhs),
        CmpOp::Lt => lhs.try_cmp(rhs)? == Ordering::Less,
        CmpOp::Le => lhs.try_cmp(rhs)? != Ordering::Greater,
        CmpOp::Gt => lhs.try_cmp(rhs)? == Ordering::Greater,
        CmpOp::Ge => lhs.try_cmp(rhs)? != Ordering::Less,
        CmpOp::In => contains(rhs, lhs)?,
        CmpOp::NotIn => !contains(rhs, lhs)?,
    };
    Ok(result)
}

fn contains(container: &Value, needle: &Value) -> Result<bool, EvalError> {
    match (container, needle) {
        (Value::List(items), needle) => Ok(items.iter().any(|item| item.loose_eq(needle))),
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Map(map), Value::Str(key)) => Ok(map.contains_key(key)),
        (container, needle) => Err(EvalError::Type(format!(
            "'in' requires a container, got {} in {}",
            needle.type_name(),
            container.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::Lexer;
    use crate::expr::parser::Parser;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::at(
            json!({
                "amount": 1500,
                "currency": "USD",
                "timestamp": "2024-05-01T09:30:00Z",
                "merchant": {"name": "Corner Shop", "category": "grocery"}
            }),
            vec![
                json!({"amount": 20, "currency": "USD", "merchant": {"name": "Cafe"}}),
                json!({"amount": 35, "currency": "EUR", "merchant": {"name": "Kiosk"}}),
            ],
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    fn eval(input: &str) -> Result<Value, EvalError> {
        let ctx = ctx();
        let expr = Parser::new(Lexer::new(input).tokenize()?, 64).parse()?;
        Interpreter::new(&ctx).eval(&expr)
    }

    #[test]
    fn test_threshold_rule() {
        assert_eq!(eval("transaction['amount'] > 1000").unwrap(), Value::Bool(true));
        assert_eq!(eval("transaction.amount <= 1000").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_membership() {
        assert_eq!(
            eval("transaction['currency'] not in ['USD', 'EUR']").unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval("'Shop' in transaction.merchant.name").unwrap(), Value::Bool(true));
        assert_eq!(eval("'category' in transaction.merchant").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_history_helpers() {
        assert_eq!(eval("len(history)").unwrap(), Value::Number(2.0));
        assert_eq!(eval("sum(pluck(history, 'amount'))").unwrap(), Value::Number(55.0));
        assert_eq!(
            eval("history[-1].merchant.name.lower() == 'kiosk'").unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_recency_with_datetimes() {
        assert_eq!(
            eval("now - parse_datetime(transaction['timestamp']) < hours(3)").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval("(now - parse_datetime(transaction.timestamp)).minutes").unwrap(),
            Value::Number(150.0)
        );
        assert_eq!(eval("today.hour == 0 and now.weekday == 2").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_chained_comparison_short_circuits() {
        assert_eq!(eval("0 < transaction.amount < 2000").unwrap(), Value::Bool(true));
        // the second link would fail to order str against number
        assert_eq!(eval("5 < 1 < 'x'").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_boolean_short_circuit_skips_errors() {
        assert_eq!(eval("False and missing_name").unwrap(), Value::Bool(false));
        assert_eq!(eval("True or 1 / 0").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_python_modulo() {
        assert_eq!(eval("-7 % 3").unwrap(), Value::Number(2.0));
        assert_eq!(eval("7 % -3").unwrap(), Value::Number(-2.0));
    }

    #[test]
    fn test_runtime_errors() {
        assert!(matches!(eval("unknown > 1"), Err(EvalError::UnknownIdentifier(_))));
        assert!(matches!(eval("transaction['nope']"), Err(EvalError::MissingKey(_))));
        assert!(matches!(eval("history[5]"), Err(EvalError::IndexOutOfRange { index: 5, len: 2 })));
        assert!(matches!(eval("transaction.amount / 0"), Err(EvalError::DivisionByZero)));
        assert!(matches!(eval("transaction.currency > 3"), Err(EvalError::Type(_))));
        assert!(matches!(eval("transaction.amount()"), Err(EvalError::NotCallable(_))));
    }
}
