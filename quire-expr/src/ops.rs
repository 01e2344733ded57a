//! Operator semantics: arithmetic, equality, ordering and membership.

use crate::ast::{BinOp, CmpOp};
use crate::error::{ExprError, Result};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use quire_types::Value;
use std::cmp::Ordering;

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Float(x) => Some(Num::Float(*x)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(x) => x,
        }
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn unsupported(op: &str, l: &Value, r: &Value) -> ExprError {
    ExprError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        l.type_name(),
        r.type_name()
    ))
}

fn overflow() -> ExprError {
    ExprError::type_error("arithmetic overflow")
}

/// Longest string `str * int` may produce
const MAX_REPEAT_LEN: usize = 1 << 20;

fn small_int(i: i64) -> Result<i32> {
    i32::try_from(i).map_err(|_| overflow())
}

/// Apply an arithmetic operator
pub fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (Num::of(l), Num::of(r)) {
        return numeric(op, a, b);
    }

    let value = match (op, l, r) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Value::Str(format!("{}{}", a, b)),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            Value::List(a.iter().chain(b.iter()).cloned().collect())
        }
        (BinOp::Add, Value::Date(d), Value::Duration(dur))
        | (BinOp::Add, Value::Duration(dur), Value::Date(d)) => {
            Value::Date(d.checked_add_signed(*dur).ok_or_else(overflow)?)
        }
        (BinOp::Add, Value::DateTime(dt), Value::Duration(dur))
        | (BinOp::Add, Value::Duration(dur), Value::DateTime(dt)) => {
            Value::DateTime(dt.checked_add_signed(*dur).ok_or_else(overflow)?)
        }
        (BinOp::Add, Value::Duration(a), Value::Duration(b)) => {
            Value::Duration(a.checked_add(b).ok_or_else(overflow)?)
        }
        (BinOp::Sub, Value::Date(d), Value::Duration(dur)) => {
            Value::Date(d.checked_sub_signed(*dur).ok_or_else(overflow)?)
        }
        (BinOp::Sub, Value::DateTime(dt), Value::Duration(dur)) => {
            Value::DateTime(dt.checked_sub_signed(*dur).ok_or_else(overflow)?)
        }
        (BinOp::Sub, Value::Date(a), Value::Date(b)) => Value::Duration(a.signed_duration_since(*b)),
        (BinOp::Sub, Value::DateTime(a), Value::DateTime(b)) => {
            Value::Duration(a.signed_duration_since(*b))
        }
        (BinOp::Sub, Value::DateTime(a), Value::Date(b)) => {
            Value::Duration(a.signed_duration_since(midnight(*b)))
        }
        (BinOp::Sub, Value::Date(a), Value::DateTime(b)) => {
            Value::Duration(midnight(*a).signed_duration_since(*b))
        }
        (BinOp::Sub, Value::Duration(a), Value::Duration(b)) => {
            Value::Duration(a.checked_sub(b).ok_or_else(overflow)?)
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            let times = usize::try_from(*n).unwrap_or(0);
            match s.len().checked_mul(times) {
                Some(len) if len <= MAX_REPEAT_LEN => Value::Str(s.repeat(times)),
                _ => return Err(overflow()),
            }
        }
        (BinOp::Mul, Value::Duration(d), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::Duration(d)) => {
            Value::Duration(d.checked_mul(small_int(*n)?).ok_or_else(overflow)?)
        }
        (BinOp::Div, Value::Duration(d), Value::Int(n)) => {
            if *n == 0 {
                return Err(ExprError::ZeroDivision);
            }
            Value::Duration(d.checked_div(small_int(*n)?).ok_or_else(overflow)?)
        }
        _ => return Err(unsupported(op.symbol(), l, r)),
    };
    Ok(value)
}

fn numeric(op: BinOp, a: Num, b: Num) -> Result<Value> {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        return match op {
            BinOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            BinOp::Div if y == 0 => Err(ExprError::ZeroDivision),
            BinOp::Div => Ok(Value::Float(x as f64 / y as f64)),
            BinOp::Mod if y == 0 => Err(ExprError::ZeroDivision),
            BinOp::Mod => {
                // result takes the sign of the divisor
                let r = x.checked_rem(y).ok_or_else(overflow)?;
                Ok(Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
            }
        };
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::Mod if y == 0.0 => return Err(ExprError::ZeroDivision),
        BinOp::Div => x / y,
        BinOp::Mod => x - y * (x / y).floor(),
    };
    Ok(Value::Float(result))
}

/// Equality with numeric coercion between ints, floats and bools
pub fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Some(a), Some(b)) = (Num::of(l), Num::of(r)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        };
    }
    match (l, r) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => l == r,
    }
}

/// Ordering between two values of compatible types
pub fn compare_order(op: &str, l: &Value, r: &Value) -> Result<Ordering> {
    let not_supported = || {
        ExprError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op,
            l.type_name(),
            r.type_name()
        ))
    };

    if let (Some(a), Some(b)) = (Num::of(l), Num::of(r)) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => Ok(x.cmp(&y)),
            _ => a.as_f64().partial_cmp(&b.as_f64()).ok_or_else(not_supported),
        };
    }

    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a.cmp(b)),
        (Value::Date(a), Value::DateTime(b)) => Ok(midnight(*a).cmp(b)),
        (Value::DateTime(a), Value::Date(b)) => Ok(a.cmp(&midnight(*b))),
        (Value::Duration(a), Value::Duration(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare_order(op, x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(not_supported()),
    }
}

/// Membership test for `in`
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(ExprError::type_error(format!(
                "'in <str>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.iter().any(|x| values_equal(x, item))),
        Value::Map(map) => Ok(item.as_str().is_some_and(|k| map.contains_key(k))),
        other => Err(ExprError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Evaluate a single comparison step
pub fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool> {
    Ok(match op {
        CmpOp::Eq => values_equal(l, r),
        CmpOp::Ne => !values_equal(l, r),
        CmpOp::Lt => compare_order(op.symbol(), l, r)? == Ordering::Less,
        CmpOp::Le => compare_order(op.symbol(), l, r)? != Ordering::Greater,
        CmpOp::Gt => compare_order(op.symbol(), l, r)? == Ordering::Greater,
        CmpOp::Ge => compare_order(op.symbol(), l, r)? != Ordering::Less,
        CmpOp::In => contains(r, l)?,
        CmpOp::NotIn => !contains(r, l)?,
    })
}

/// Unary minus
pub fn negate(value: &Value) -> Result<Value> {
    match value {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
        Value::Float(x) => Ok(Value::Float(-x)),
        Value::Duration(d) => Ok(Value::Duration(-*d)),
        other => Err(ExprError::type_error(format!(
            "bad operand type for unary -: '{}'",
            other.type_name()
        ))),
    }
}

/// Build a duration from fractional seconds
pub fn duration_from_secs(secs: f64) -> Result<TimeDelta> {
    let millis = (secs * 1000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(overflow());
    }
    TimeDelta::try_milliseconds(millis as i64).ok_or_else(overflow)
}
