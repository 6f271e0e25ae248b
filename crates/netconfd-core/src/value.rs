//! Payload values produced by the edit compiler.

use indexmap::IndexMap;
use serde::Serialize;

/// Ordered name → value map used for every compiled payload.
pub type ValueMap = IndexMap<String, Value>;

/// A leaf value or a nested structure, serialised as plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(u64),
    Bool(bool),
    Map(ValueMap),
    List(Vec<Value>),
}

impl Value {
    /// Infer a typed value from element text: unsigned integer, then
    /// boolean, then string.
    pub fn infer(text: &str) -> Self {
        if let Ok(n) = text.parse::<u64>() {
            return Self::Number(n);
        }
        match text {
            "t" | "T" | "true" | "TRUE" | "True" => Self::Bool(true),
            "f" | "F" | "false" | "FALSE" | "False" => Self::Bool(false),
            _ => Self::String(text.to_owned()),
        }
    }

    /// Strip one level of surrounding double quotes from a string value.
    ///
    /// Quoted text stays a string: `"123"` becomes the string `123`, not a
    /// number.
    pub fn unquoted(self) -> Self {
        match self {
            Self::String(s) if s.contains('"') => Self::String(unquote(&s)),
            other => other,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Self::Map(map)
    }
}

fn unquote(s: &str) -> String {
    let Some(inner) = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return s.to_owned();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
