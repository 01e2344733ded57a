//! Numeric sort keys for query ordering.

use crate::error::Result;
use quire_types::Value;

/// Key assigned when a sort expression fails; sorts first ascending
pub const SORT_KEY_MIN: f64 = f64::NEG_INFINITY;

/// Map a value onto the numeric sort axis.
///
/// Numbers sort as themselves, dates and datetimes by UNIX timestamp and
/// durations by seconds. Anything else falls back to the sum of the
/// character codes of its string form, which groups equal strings together
/// but is not lexical order.
pub fn sort_key(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(x) if x.is_nan() => SORT_KEY_MIN,
        Value::Float(x) => *x,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() as f64,
        Value::DateTime(dt) => dt.and_utc().timestamp() as f64,
        Value::Duration(d) => d.num_milliseconds() as f64 / 1000.0,
        other => other.to_string().chars().map(|c| f64::from(u32::from(c))).sum(),
    }
}

/// Sort key of an evaluation result, with errors mapped to [`SORT_KEY_MIN`]
pub fn sort_key_or_min(result: Result<Value>) -> f64 {
    result.map(|v| sort_key(&v)).unwrap_or(SORT_KEY_MIN)
}
