//! Input validation for collection mutations
//!
//! A [`FieldSchema`] is a fixed list of optional fields. Validating an input
//! object rejects keys outside that list, checks each value against its
//! [`FieldKind`], and hands back typed values.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::timestamp;

/// Errors raised when input does not match a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Expected an object of fields")]
    NotAnObject,

    #[error("Unknown field: {field}")]
    UnknownField { field: String },

    #[error("Invalid value for {field}: expected {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("Value for {field} must be at least {min} character(s) long")]
    TooShort { field: String, min: usize },

    #[error("Invalid timestamp for {field}: '{value}'")]
    InvalidTimestamp { field: String, value: String },
}

/// How a field's value is checked and converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any string; numbers are coerced to their decimal form
    String,
    /// A JSON string of at least `min` characters
    Text { min: usize },
    /// An ISO-8601 timestamp string
    Timestamp,
}

/// One optional field of a schema
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A typed, validated field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Timestamp(DateTime<FixedOffset>),
}

/// Fields that passed validation, keyed by name
#[derive(Debug, Default)]
pub struct Validated {
    values: IndexMap<&'static str, FieldValue>,
}

impl Validated {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take a string field out of the validated set
    pub fn take_string(&mut self, name: &str) -> Option<String> {
        match self.values.shift_remove(name) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Take a timestamp field out of the validated set
    pub fn take_timestamp(&mut self, name: &str) -> Option<DateTime<FixedOffset>> {
        match self.values.shift_remove(name) {
            Some(FieldValue::Timestamp(ts)) => Some(ts),
            _ => None,
        }
    }
}

/// A closed set of optional fields
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    fields: &'static [Field],
}

impl FieldSchema {
    pub const fn new(fields: &'static [Field]) -> Self {
        Self { fields }
    }

    /// Validate `input` against this schema
    pub fn validate(&self, input: &Value) -> Result<Validated, ValidationError> {
        let object = input.as_object().ok_or(ValidationError::NotAnObject)?;
        let mut validated = Validated::default();

        for (key, value) in object {
            let field = self
                .fields
                .iter()
                .find(|f| f.name == key)
                .ok_or_else(|| ValidationError::UnknownField { field: key.clone() })?;

            validated
                .values
                .insert(field.name, check_field(field, value)?);
        }

        Ok(validated)
    }
}

fn check_field(field: &Field, value: &Value) -> Result<FieldValue, ValidationError> {
    let invalid = |expected| ValidationError::InvalidType {
        field: field.name.to_string(),
        expected,
    };

    match field.kind {
        FieldKind::String => match value {
            Value::String(s) => Ok(FieldValue::String(s.clone())),
            Value::Number(n) => Ok(FieldValue::String(n.to_string())),
            _ => Err(invalid("a string")),
        },
        FieldKind::Text { min } => {
            let s = value.as_str().ok_or_else(|| invalid("a string"))?;
            if s.chars().count() < min {
                return Err(ValidationError::TooShort {
                    field: field.name.to_string(),
                    min,
                });
            }
            Ok(FieldValue::String(s.to_string()))
        }
        FieldKind::Timestamp => {
            let s = value.as_str().ok_or_else(|| invalid("an ISO-8601 timestamp"))?;
            timestamp::parse(s)
                .map(FieldValue::Timestamp)
                .ok_or_else(|| ValidationError::InvalidTimestamp {
                    field: field.name.to_string(),
                    value: s.to_string(),
                })
        }
    }
}
