//! Runtime value representation for template evaluation.
//!
//! Every argument, variable, and function result inside a render is a
//! [`Value`]: a small tagged union over the JSON-ish shapes that custom
//! commands work with. Intermediate results stay typed throughout an
//! evaluation; conversion to text happens exactly once, when a resolved
//! expression is substituted back into the template (see
//! [`Value::stringify`]).
//!
//! Two textual conversions exist and they are deliberately different:
//!
//! - [`Value::stringify`] - final template substitution. Null renders as
//!   the empty string, integral numbers render without a trailing `.0`,
//!   lists and maps render as JSON.
//! - [`Value::substitution_text`] - re-substitution of a resolved `(...)`
//!   sub-expression into its parent expression. Maps prefer their `value`
//!   field, then their `id` field, then JSON.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Largest integer magnitude that survives an `f64` round trip intact.
///
/// Bare numeric tokens above this bound are kept as strings so platform
/// snowflake identifiers never lose precision.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// A runtime value inside one render.
///
/// Serialization is untagged so captured contexts persist as plain JSON
/// and replay through the scheduler without any wrapper noise. `Serialize`
/// is hand-written so integral numbers emit as integers (`1`, not `1.0`),
/// keeping serialized contexts and JSON-rendered lists/maps in agreement
/// with [`Value::stringify`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Num(n) => {
                if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Final-substitution text form.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Text form used when a resolved `(...)` sub-expression is written
    /// back into its parent expression.
    ///
    /// Maps prefer a `value` field, then an `id` field, then JSON; every
    /// other shape uses [`Value::stringify`].
    pub fn substitution_text(&self) -> String {
        if let Value::Map(map) = self {
            if let Some(v) = map.get("value") {
                return v.stringify();
            }
            if let Some(v) = map.get("id") {
                return v.stringify();
            }
            return serde_json::to_string(self).unwrap_or_default();
        }
        self.stringify()
    }

    /// Numeric view: numbers pass through, numeric strings parse, booleans
    /// map to 1/0. Everything else is `None`.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// List view. Strings holding a JSON array parse back into a list;
    /// this is what lets a parenthesized sub-expression's re-substituted
    /// text flow into the array builtins.
    pub fn as_list(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.clone()),
            Value::Str(s) if s.trim_start().starts_with('[') => {
                match serde_json::from_str::<Value>(s) {
                    Ok(Value::List(items)) => Some(items),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Truthiness follows the conventions command authors expect:
    /// empty string, `"false"`, zero, null, and empty collections are
    /// false; everything else is true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s != "false",
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Walks a dotted path (`a.b.0`) through nested maps and lists.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            if segment.is_empty() {
                continue;
            }
            current = match current {
                Value::Map(map) => map.get(segment)?,
                Value::List(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Converts into the equivalent `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Num(n) => {
                if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Converts from a `serde_json::Value`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect(),
            ),
        }
    }
}

/// Integral floats render without a decimal point; others use the shortest
/// round-trippable form.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
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

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::Str).collect())
    }
}
