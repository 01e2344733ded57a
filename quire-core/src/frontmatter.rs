//! Frontmatter parsing from markdown files.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use quire_types::Value;
use regex::Regex;
use serde_yaml::Value as Yaml;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Frontmatter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// Field bag parsed from a frontmatter block
pub type Fields = BTreeMap<String, Value>;

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n(.*))?$")
            .expect("frontmatter regex is valid")
    })
}

/// Split markdown content into its frontmatter fields and body
///
/// Content without a frontmatter block yields an empty field bag and the
/// full content as body.
///
/// # Example
///
/// ```
/// use quire_core::frontmatter::parse_frontmatter;
/// use quire_types::Value;
///
/// let content = "---\ntitle: My Post\ndate: 2025-01-01\n---\n# Hello World\n";
///
/// let (fields, body) = parse_frontmatter(content).unwrap();
/// assert_eq!(fields["title"], Value::from("My Post"));
/// assert!(matches!(fields["date"], Value::Date(_)));
/// assert!(body.starts_with("# Hello World"));
/// ```
pub fn parse_frontmatter(content: &str) -> Result<(Fields, &str), FrontmatterError> {
    let Some(captures) = frontmatter_regex().captures(content) else {
        return Ok((Fields::new(), content));
    };

    let yaml = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());

    let fields = match serde_yaml::from_str::<Yaml>(yaml)? {
        Yaml::Null => Fields::new(),
        Yaml::Mapping(map) => map
            .into_iter()
            .filter_map(|(k, v)| yaml_key(&k).map(|k| (k, from_yaml(v))))
            .collect(),
        other => return Err(FrontmatterError::NotAMapping(yaml_kind(&other))),
    };

    Ok((fields, body))
}

fn yaml_kind(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "a boolean",
        Yaml::Number(_) => "a number",
        Yaml::String(_) => "a string",
        Yaml::Sequence(_) => "a sequence",
        Yaml::Mapping(_) => "a mapping",
        Yaml::Tagged(_) => "a tagged value",
    }
}

fn yaml_key(key: &Yaml) -> Option<String> {
    match key {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a YAML value into a field value
///
/// Strings shaped like dates (`YYYY-MM-DD`) or datetimes (RFC 3339 or
/// `YYYY-MM-DD HH:MM[:SS]`) become [`Value::Date`] / [`Value::DateTime`].
pub fn from_yaml(value: Yaml) -> Value {
    match value {
        Yaml::Null => Value::None,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Yaml::String(s) => parse_temporal(&s).unwrap_or(Value::Str(s)),
        Yaml::Sequence(items) => Value::List(items.into_iter().map(from_yaml).collect()),
        Yaml::Mapping(map) => Value::Map(
            map.into_iter()
                .filter_map(|(k, v)| yaml_key(&k).map(|k| (k, from_yaml(v))))
                .collect(),
        ),
        Yaml::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn parse_temporal(s: &str) -> Option<Value> {
    let s = s.trim();
    if !s.starts_with(|c: char| c.is_ascii_digit()) || s.len() < 10 {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Value::Date(date));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Value::DateTime(dt.naive_utc()));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(Value::DateTime)
}
