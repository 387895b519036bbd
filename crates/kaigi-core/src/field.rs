use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// Identifies one editable field: the entity's row id plus the field name.
/// Debounce scheduling is keyed by this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldKey {
    pub entity_id: Uuid,
    pub field: String,
}

impl FieldKey {
    pub fn new(entity_id: Uuid, field: impl Into<String>) -> Self {
        Self {
            entity_id,
            field: field.into(),
        }
    }
}

/// A committable field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(i64),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => Value::from(*n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n)
    }
}

/// Parse raw input for a numeric field.
///
/// An empty (or all-whitespace) string is a legal interim state while the
/// user clears the box: it yields `None` and must not be committed as zero.
/// Non-empty, non-numeric input is rejected outright.
pub fn parse_numeric(input: &str) -> Result<Option<i64>, CoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| CoreError::InvalidNumber(input.to_string()))
}
