//! Raw gateway records and merged output payloads
//!
//! A [`RawRecord`] is one loosely-structured event as the gateway emits it.
//! A [`Payload`] is the flat attribute map every applicable decoder writes
//! into during a single dispatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FieldError, StatsError};

/// One raw event from the gateway: field name to JSON value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, StatsError> {
        let value: Value = serde_json::from_str(text)?;
        Self::try_from(value)
    }

    /// Builder-style field insertion
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Check whether a field is present (any value, `null` included)
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Raw field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field value cloned, or `null` when absent
    pub fn get_or_null(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }

    /// String field
    pub fn get_str(&self, key: &'static str) -> Result<&str, FieldError> {
        match self.fields.get(key) {
            None => Err(FieldError::Missing(key)),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(FieldError::WrongType {
                field: key,
                expected: "string",
            }),
        }
    }

    /// Integer field; integral floats are accepted
    pub fn get_i64(&self, key: &'static str) -> Result<i64, FieldError> {
        let value = self.fields.get(key).ok_or(FieldError::Missing(key))?;
        json_i64(value).ok_or(FieldError::WrongType {
            field: key,
            expected: "integer",
        })
    }

    /// Numeric field of any kind
    pub fn get_f64(&self, key: &'static str) -> Result<f64, FieldError> {
        let value = self.fields.get(key).ok_or(FieldError::Missing(key))?;
        value.as_f64().ok_or(FieldError::WrongType {
            field: key,
            expected: "number",
        })
    }

    /// Integer field given either as a JSON number or as text in any base
    ///
    /// Text follows the usual literal prefixes: `0x` hex, `0o` octal,
    /// `0b` binary, decimal otherwise, with an optional sign.
    pub fn parse_int(&self, key: &'static str) -> Result<i64, FieldError> {
        match self.fields.get(key) {
            None => Err(FieldError::Missing(key)),
            Some(Value::String(s)) => parse_int_literal(s).ok_or_else(|| FieldError::InvalidNumber {
                field: key,
                value: s.clone(),
            }),
            Some(value) => json_i64(value).ok_or(FieldError::WrongType {
                field: key,
                expected: "integer or numeric string",
            }),
        }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = StatsError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            Value::Null => Err(StatsError::NotAnObject("null")),
            Value::Bool(_) => Err(StatsError::NotAnObject("bool")),
            Value::Number(_) => Err(StatsError::NotAnObject("number")),
            Value::String(_) => Err(StatsError::NotAnObject("string")),
            Value::Array(_) => Err(StatsError::NotAnObject("array")),
        }
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn json_i64(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse an integer literal with optional sign and radix prefix
pub fn parse_int_literal(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = match body.get(..2) {
        Some("0x") | Some("0X") => (16, &body[2..]),
        Some("0o") | Some("0O") => (8, &body[2..]),
        Some("0b") | Some("0B") => (2, &body[2..]),
        _ => (10, body),
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Merged attribute map produced by one dispatch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    attributes: BTreeMap<String, Value>,
}

impl Payload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, overwriting an earlier value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Merge another payload into this one; `other` wins on conflicts
    pub fn extend_from(&mut self, other: Payload) {
        self.attributes.extend(other.attributes);
    }

    /// Attribute value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Check whether an attribute was written
    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Iterate over attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }

    /// Attribute names in name order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.attributes.keys()
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if nothing was written
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Convert into a JSON object
    pub fn into_value(self) -> Value {
        Value::Object(self.attributes.into_iter().collect())
    }
}

impl IntoIterator for Payload {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}
