//! Whitelisted builtin functions, value methods and attributes.

use crate::error::{ExprError, Result};
use crate::ops::{compare_order, duration_from_secs, values_equal};
use chrono::{Datelike, Local, NaiveDate, Timelike};
use quire_types::Value;
use std::cmp::Ordering;
use std::fmt::{self, Write};

/// Names of the builtin functions available to every expression
pub const FUNCTIONS: &[&str] = &[
    "len", "str", "int", "float", "bool", "lower", "upper", "abs", "min", "max", "sorted",
    "date", "today", "now", "timedelta",
];

pub fn is_function(name: &str) -> bool {
    FUNCTIONS.contains(&name)
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn str_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        ExprError::call(
            name,
            format!("expected a string argument, got {}", value.type_name()),
        )
    })
}

fn length(value: &Value) -> Result<i64> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(ExprError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(n as i64)
}

fn extreme(name: &str, args: &[Value], wanted: Ordering) -> Result<Value> {
    let items: &[Value] = match args {
        [Value::List(items)] => items,
        [_] | [] => {
            return Err(ExprError::call(name, "expected a list or several arguments"));
        }
        many => many,
    };
    let mut best: Option<&Value> = None;
    for item in items {
        best = match best {
            Some(current) if compare_order(name, item, current)? != wanted => Some(current),
            _ => Some(item),
        };
    }
    best.cloned()
        .ok_or_else(|| ExprError::call(name, "arg is an empty sequence"))
}

fn sort_values(items: &[Value]) -> Result<Vec<Value>> {
    let mut sorted = items.to_vec();
    let mut failure = None;
    sorted.sort_by(|a, b| match compare_order("<", a, b) {
        Ok(ord) => ord,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(sorted),
    }
}

fn parse_date(name: &str, text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| ExprError::call(name, format!("invalid date '{}': {}", text, e)))
}

fn timedelta(positional: &[Value], keywords: &[(String, Value)]) -> Result<Value> {
    const UNITS: &[(&str, f64)] = &[
        ("days", 86_400.0),
        ("seconds", 1.0),
        ("minutes", 60.0),
        ("hours", 3_600.0),
        ("weeks", 604_800.0),
    ];

    if positional.len() > UNITS.len() {
        return Err(ExprError::Arity {
            name: "timedelta".into(),
            expected: UNITS.len(),
            got: positional.len(),
        });
    }

    let mut secs = 0.0;
    let named = keywords.iter().map(|(k, v)| (k.as_str(), v));
    let given = UNITS.iter().map(|(unit, _)| *unit).zip(positional).chain(named);
    for (unit, value) in given {
        let scale = UNITS
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, s)| *s)
            .ok_or_else(|| {
                ExprError::call("timedelta", format!("unexpected keyword argument '{}'", unit))
            })?;
        let amount = value.as_f64().ok_or_else(|| {
            ExprError::call(
                "timedelta",
                format!("{} must be a number, got {}", unit, value.type_name()),
            )
        })?;
        secs += amount * scale;
    }
    duration_from_secs(secs).map(Value::Duration)
}

/// Call a builtin function by name
pub fn call_function(name: &str, args: &[Value], keywords: &[(String, Value)]) -> Result<Value> {
    if name == "timedelta" {
        return timedelta(args, keywords);
    }
    if let Some((key, _)) = keywords.first() {
        return Err(ExprError::call(
            name,
            format!("unexpected keyword argument '{}'", key),
        ));
    }

    match name {
        "len" => {
            arity(name, args, 1)?;
            length(&args[0]).map(Value::Int)
        }
        "str" => {
            arity(name, args, 1)?;
            Ok(Value::Str(args[0].to_string()))
        }
        "int" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
                Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    ExprError::call(name, format!("invalid literal for int(): '{}'", s))
                }),
                other => Err(ExprError::call(
                    name,
                    format!("cannot convert {} to int", other.type_name()),
                )),
            }
        }
        "float" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    ExprError::call(name, format!("could not convert string to float: '{}'", s))
                }),
                other => other.as_f64().map(Value::Float).ok_or_else(|| {
                    ExprError::call(
                        name,
                        format!("cannot convert {} to float", other.type_name()),
                    )
                }),
            }
        }
        "bool" => {
            arity(name, args, 1)?;
            Ok(Value::Bool(args[0].is_truthy()))
        }
        "lower" | "upper" => {
            arity(name, args, 1)?;
            call_method(&args[0], name, &[])
        }
        "abs" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::Int(i) => Ok(Value::Int(i.saturating_abs())),
                Value::Float(x) => Ok(Value::Float(x.abs())),
                Value::Duration(d) => Ok(Value::Duration(d.abs())),
                other => Err(ExprError::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }
        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        "sorted" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::List(items) => sort_values(items).map(Value::List),
                other => Err(ExprError::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                ))),
            }
        }
        "date" => match args {
            [Value::Str(text)] => parse_date(name, text).map(Value::Date),
            [y, m, d] => {
                let (y, m, d) = match (y.as_int(), m.as_int(), d.as_int()) {
                    (Some(y), Some(m), Some(d)) => (y, m, d),
                    _ => return Err(ExprError::call(name, "year, month and day must be integers")),
                };
                i32::try_from(y)
                    .ok()
                    .zip(u32::try_from(m).ok())
                    .zip(u32::try_from(d).ok())
                    .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
                    .map(Value::Date)
                    .ok_or_else(|| ExprError::call(name, "day is out of range for month"))
            }
            _ => Err(ExprError::Arity {
                name: name.into(),
                expected: 3,
                got: args.len(),
            }),
        },
        "today" => {
            arity(name, args, 0)?;
            Ok(Value::Date(Local::now().date_naive()))
        }
        "now" => {
            arity(name, args, 0)?;
            Ok(Value::DateTime(Local::now().naive_local()))
        }
        _ => Err(ExprError::Unbound {
            name: name.to_string(),
        }),
    }
}

fn no_method(value: &Value, method: &str) -> ExprError {
    ExprError::type_error(format!(
        "'{}' object has no attribute '{}'",
        value.type_name(),
        method
    ))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Render a user-supplied date format; invalid specifiers become an error
fn strftime(formatted: impl fmt::Display) -> Result<Value> {
    let mut out = String::new();
    write!(out, "{}", formatted)
        .map_err(|_| ExprError::call("strftime", "invalid format string"))?;
    Ok(Value::Str(out))
}

fn joined(sep: &str, items: &[Value]) -> Value {
    let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    Value::Str(parts.join(sep))
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value> {
    let value = match (method, args) {
        ("upper", []) => Value::Str(s.to_uppercase()),
        ("lower", []) => Value::Str(s.to_lowercase()),
        ("strip", []) => Value::Str(s.trim().to_string()),
        ("lstrip", []) => Value::Str(s.trim_start().to_string()),
        ("rstrip", []) => Value::Str(s.trim_end().to_string()),
        ("title", []) => Value::Str(title_case(s)),
        ("startswith", [prefix]) => Value::Bool(s.starts_with(str_arg(method, prefix)?)),
        ("endswith", [suffix]) => Value::Bool(s.ends_with(str_arg(method, suffix)?)),
        ("contains", [needle]) => Value::Bool(s.contains(str_arg(method, needle)?)),
        ("count", [needle]) => Value::Int(s.matches(str_arg(method, needle)?).count() as i64),
        ("find", [needle]) => {
            let needle = str_arg(method, needle)?;
            Value::Int(
                s.find(needle)
                    .map(|byte| s[..byte].chars().count() as i64)
                    .unwrap_or(-1),
            )
        }
        ("split", []) => Value::List(s.split_whitespace().map(Value::from).collect()),
        ("split", [sep]) => {
            let sep = str_arg(method, sep)?;
            if sep.is_empty() {
                return Err(ExprError::call(method, "empty separator"));
            }
            Value::List(s.split(sep).map(Value::from).collect())
        }
        ("replace", [from, to]) => {
            Value::Str(s.replace(str_arg(method, from)?, str_arg(method, to)?))
        }
        ("join", [Value::List(items)]) => joined(s, items),
        ("upper" | "lower" | "strip" | "lstrip" | "rstrip" | "title", _) => {
            return Err(ExprError::Arity {
                name: method.into(),
                expected: 0,
                got: args.len(),
            })
        }
        ("startswith" | "endswith" | "contains" | "count" | "find" | "join", _) => {
            return Err(ExprError::Arity {
                name: method.into(),
                expected: 1,
                got: args.len(),
            })
        }
        ("replace", _) => {
            return Err(ExprError::Arity {
                name: method.into(),
                expected: 2,
                got: args.len(),
            })
        }
        _ => return Err(no_method(&Value::Str(s.to_string()), method)),
    };
    Ok(value)
}

fn list_method(items: &[Value], method: &str, args: &[Value]) -> Result<Value> {
    let value = match (method, args) {
        ("index", [needle]) => {
            let pos = items
                .iter()
                .position(|v| values_equal(v, needle))
                .ok_or_else(|| ExprError::Index {
                    message: format!("{} is not in list", needle.repr()),
                })?;
            Value::Int(pos as i64)
        }
        ("count", [needle]) => {
            Value::Int(items.iter().filter(|v| values_equal(v, needle)).count() as i64)
        }
        ("contains", [needle]) => Value::Bool(items.iter().any(|v| values_equal(v, needle))),
        ("join", []) => joined("", items),
        ("join", [sep]) => joined(str_arg(method, sep)?, items),
        ("index" | "count" | "contains", _) => {
            return Err(ExprError::Arity {
                name: method.into(),
                expected: 1,
                got: args.len(),
            })
        }
        _ => return Err(no_method(&Value::List(Vec::new()), method)),
    };
    Ok(value)
}

/// Call a method on a plain (non-handle) value
pub fn call_method(target: &Value, method: &str, args: &[Value]) -> Result<Value> {
    match target {
        Value::Str(s) => string_method(s, method, args),
        Value::List(items) => list_method(items, method, args),
        Value::Map(map) => match (method, args) {
            ("get", [key]) => Ok(map.get(str_arg(method, key)?).cloned().unwrap_or_default()),
            ("get", [key, default]) => Ok(map
                .get(str_arg(method, key)?)
                .cloned()
                .unwrap_or_else(|| default.clone())),
            ("keys", []) => Ok(Value::List(map.keys().map(|k| Value::from(k.as_str())).collect())),
            ("values", []) => Ok(Value::List(map.values().cloned().collect())),
            _ => Err(no_method(target, method)),
        },
        Value::Date(d) => match (method, args) {
            ("isoformat", []) => Ok(Value::Str(d.format("%Y-%m-%d").to_string())),
            ("timestamp", []) => Ok(Value::Float(
                d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() as f64,
            )),
            ("weekday", []) => Ok(Value::Int(i64::from(d.weekday().num_days_from_monday()))),
            ("strftime", [fmt]) => strftime(d.format(str_arg(method, fmt)?)),
            _ => Err(no_method(target, method)),
        },
        Value::DateTime(dt) => match (method, args) {
            ("isoformat", []) => Ok(Value::Str(dt.format("%Y-%m-%dT%H:%M:%S").to_string())),
            ("timestamp", []) => Ok(Value::Float(dt.and_utc().timestamp() as f64)),
            ("date", []) => Ok(Value::Date(dt.date())),
            ("weekday", []) => Ok(Value::Int(i64::from(dt.weekday().num_days_from_monday()))),
            ("strftime", [fmt]) => strftime(dt.format(str_arg(method, fmt)?)),
            _ => Err(no_method(target, method)),
        },
        Value::Duration(d) => match (method, args) {
            ("total_seconds", []) => Ok(Value::Float(d.num_milliseconds() as f64 / 1000.0)),
            _ => Err(no_method(target, method)),
        },
        other => Err(no_method(other, method)),
    }
}

/// Read `value.name` for plain values
pub fn attribute(value: &Value, name: &str) -> Result<Value> {
    let found = match value {
        Value::Map(map) => map.get(name).cloned(),
        Value::Date(d) => match name {
            "year" => Some(Value::Int(i64::from(d.year()))),
            "month" => Some(Value::Int(i64::from(d.month()))),
            "day" => Some(Value::Int(i64::from(d.day()))),
            _ => None,
        },
        Value::DateTime(dt) => match name {
            "year" => Some(Value::Int(i64::from(dt.year()))),
            "month" => Some(Value::Int(i64::from(dt.month()))),
            "day" => Some(Value::Int(i64::from(dt.day()))),
            "hour" => Some(Value::Int(i64::from(dt.hour()))),
            "minute" => Some(Value::Int(i64::from(dt.minute()))),
            "second" => Some(Value::Int(i64::from(dt.second()))),
            _ => None,
        },
        Value::Duration(d) => match name {
            "days" => Some(Value::Int(d.num_days())),
            "seconds" => Some(Value::Int((d.num_seconds() - d.num_days() * 86_400).abs())),
            _ => None,
        },
        _ => None,
    };
    found.ok_or_else(|| no_method(value, name))
}

/// Subscript `value[index]`
pub fn index(value: &Value, idx: &Value) -> Result<Value> {
    match (value, idx) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let pos = if *i < 0 { len + i } else { *i };
            usize::try_from(pos)
                .ok()
                .and_then(|p| items.get(p))
                .cloned()
                .ok_or_else(|| ExprError::Index {
                    message: "list index out of range".into(),
                })
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let pos = if *i < 0 { len + i } else { *i };
            usize::try_from(pos)
                .ok()
                .and_then(|p| chars.get(p))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| ExprError::Index {
                    message: "string index out of range".into(),
                })
        }
        (Value::Map(map), Value::Str(key)) => map.get(key).cloned().ok_or_else(|| ExprError::Index {
            message: format!("key '{}' not found", key),
        }),
        (container, key) => Err(ExprError::type_error(format!(
            "'{}' indices must be valid, not {}",
            container.type_name(),
            key.type_name()
        ))),
    }
}
