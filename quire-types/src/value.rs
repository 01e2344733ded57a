//! Dynamic values carried by document field bags and expressions.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque reference to an object owned by the engine.
///
/// Expressions receive handles instead of borrowed objects so that the
/// evaluator never holds references into the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    /// A document, by its position in the collection
    Document(usize),
    /// The engine itself
    Site,
}

/// A dynamically typed value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Handle(Handle),
}

impl Value {
    /// Name of the value's type, as shown in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Duration(_) => "timedelta",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Handle(Handle::Document(_)) => "post",
            Value::Handle(Handle::Site) => "site",
        }
    }

    /// Python-style truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Duration(d) => !d.is_zero(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Date(_) | Value::DateTime(_) | Value::Handle(_) => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric view of ints, floats and bools
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Handle(h) => Some(*h),
            _ => None,
        }
    }

    /// Quoted representation used inside containers
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\'', "\\'")),
            Value::Date(d) => format!("date({})", d.format("%Y-%m-%d")),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Duration(d) => {
                let secs = d.num_seconds();
                let days = secs.div_euclid(86_400);
                let rest = secs.rem_euclid(86_400);
                let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);
                match days {
                    0 => f.write_str(&clock),
                    1 | -1 => write!(f, "{} day, {}", days, clock),
                    _ => write!(f, "{} days, {}", days, clock),
                }
            }
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", inner.join(", "))
            }
            Value::Map(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                write!(f, "{{{}}}", inner.join(", "))
            }
            Value::Handle(Handle::Document(idx)) => write!(f, "<post #{}>", idx),
            Value::Handle(Handle::Site) => f.write_str("<site>"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Value::Duration(d) => serializer.serialize_i64(d.num_seconds()),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Handle(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<TimeDelta> for Value {
    fn from(d: TimeDelta) -> Self {
        Value::Duration(d)
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Value::Handle(h)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::None)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from(vec![1i64]).is_truthy());
        assert!(!Value::Int(0).is_truthy());
    }

    #[test]
    fn test_display_python_style() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), "['a', 'b']");
        let d = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(Value::Date(d).to_string(), "2021-01-01");
        assert_eq!(Value::Duration(TimeDelta::days(2)).to_string(), "2 days, 0:00:00");
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Bool(true).as_int(), Some(1));
        assert_eq!(Value::from("3").as_f64(), None);
    }
}
