/// Lenient decoding of admin form input
///
/// Browser forms and JSON clients send the same fields in different shapes:
/// checkboxes arrive as "on", numbers as strings, tag lists as a single
/// comma-separated string. These helpers turn all of them into typed values
/// at the boundary so services only see clean data.
use serde::{Deserialize, Deserializer};

/// A scalar as submitted by a form or JSON client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FormValue {
    /// Blank strings count as absent
    pub fn is_blank(&self) -> bool {
        matches!(self, FormValue::Text(s) if s.trim().is_empty())
    }

    /// Finite number, or 0 for anything unparseable
    pub fn as_number(&self) -> f64 {
        match self {
            FormValue::Number(n) => finite_or_zero(*n),
            FormValue::Text(s) => parse_number(s),
            FormValue::Bool(_) => 0.0,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FormValue::Text(s) => s.trim().to_string(),
            FormValue::Number(n) => n.to_string(),
            FormValue::Bool(b) => b.to_string(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            FormValue::Bool(b) => *b,
            FormValue::Number(n) => *n != 0.0,
            FormValue::Text(s) => parse_bool(s),
        }
    }
}

/// A field that may hold one value or a list of values
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<Option<T>>),
    One(Option<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T: Clone> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<Option<T>> {
        match self {
            OneOrMany::Many(values) => values,
            OneOrMany::One(value) => vec![value],
        }
    }
}

pub fn finite_or_zero(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Parse a number, mapping blanks, garbage, NaN and infinities to 0
pub fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(finite_or_zero).unwrap_or(0.0)
}

/// Checkbox and query-string truthiness
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

/// Split a comma-separated list, trimming entries and dropping empties.
/// Duplicates are kept.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trimmed value, or `None` when blank
pub fn blank_as_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `serde(deserialize_with)` for checkbox-style booleans; absent or null is false
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<FormValue>::deserialize(deserializer)?
        .map(|v| v.as_bool())
        .unwrap_or(false))
}

/// `serde(deserialize_with)` for optional booleans; blank means unset
pub fn lenient_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<FormValue>::deserialize(deserializer)?
        .filter(|v| !v.is_blank())
        .map(|v| v.as_bool()))
}

/// `serde(deserialize_with)` for money-like numbers; garbage becomes 0
pub fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<FormValue>::deserialize(deserializer)?
        .map(|v| v.as_number())
        .unwrap_or(0.0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListInput {
    List(Vec<String>),
    Text(String),
}

/// `serde(deserialize_with)` for tag-like lists given as an array or a
/// comma-separated string
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ListInput>::deserialize(deserializer)? {
        Some(ListInput::Text(raw)) => split_tags(&raw),
        Some(ListInput::List(items)) => items
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}
