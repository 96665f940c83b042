use serde::Serialize;
use serde_json::Value;

use crate::error::SiltError;

/// Storage kind of a meta value. The integer encoding is persisted in the
/// `type` column and mirrored into the `type_enum` lookup table; it must
/// never be renumbered once entries exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Real,
    Text,
    Blob,
    Json,
}

impl ValueKind {
    pub const ALL: [ValueKind; 4] =
        [ValueKind::Real, ValueKind::Text, ValueKind::Blob, ValueKind::Json];

    /// Persisted integer tag.
    pub fn seq(self) -> i64 {
        match self {
            ValueKind::Real => 0,
            ValueKind::Text => 1,
            ValueKind::Blob => 2,
            ValueKind::Json => 3,
        }
    }

    pub fn from_seq(seq: i64) -> Result<ValueKind, SiltError> {
        match seq {
            0 => Ok(ValueKind::Real),
            1 => Ok(ValueKind::Text),
            2 => Ok(ValueKind::Blob),
            3 => Ok(ValueKind::Json),
            other => Err(SiltError::UnknownKind(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Real => "real",
            ValueKind::Text => "text",
            ValueKind::Blob => "blob",
            ValueKind::Json => "json",
        }
    }

    /// Column of `log_entries_meta` holding the payload for this kind.
    /// Json payloads share the blob column, tagged apart by `type`.
    pub(crate) fn value_column(self) -> &'static str {
        match self {
            ValueKind::Real => "real_value",
            ValueKind::Text => "text_value",
            ValueKind::Blob => "blob_value",
            ValueKind::Json => "blob_value",
        }
    }
}

/// A meta field value, one constructor per storage kind.
///
/// Record fields come out of JSON, so every numeric literal arrives as a
/// float and is stored as `Real`, integer-looking or not. Strings become
/// `Text`. Everything else (objects, arrays, booleans, null) is kept as
/// its serialized JSON form. `Blob` only ever comes back from storage or
/// from caller-built filter values; a parsed record cannot produce it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Json(Value),
}

impl MetaValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            MetaValue::Real(_) => ValueKind::Real,
            MetaValue::Text(_) => ValueKind::Text,
            MetaValue::Blob(_) => ValueKind::Blob,
            MetaValue::Json(_) => ValueKind::Json,
        }
    }

    /// Rebuilds a value from the typed row slots, dispatching on the
    /// stored tag. A NULL slot under its own tag is a data integrity
    /// failure. A Json payload of literal `null` yields `Ok(None)`; the
    /// row carries no value and the caller drops it.
    pub(crate) fn decode(
        kind: ValueKind,
        real: Option<f64>,
        text: Option<String>,
        blob: Option<Vec<u8>>,
    ) -> Result<Option<MetaValue>, SiltError> {
        match kind {
            ValueKind::Real => match real {
                Some(x) => Ok(Some(MetaValue::Real(x))),
                None => Err(SiltError::MissingValue(kind)),
            },
            ValueKind::Text => match text {
                Some(s) => Ok(Some(MetaValue::Text(s))),
                None => Err(SiltError::MissingValue(kind)),
            },
            ValueKind::Blob => match blob {
                Some(b) => Ok(Some(MetaValue::Blob(b))),
                None => Err(SiltError::MissingValue(kind)),
            },
            ValueKind::Json => match blob {
                Some(b) => match serde_json::from_slice::<Value>(&b)? {
                    Value::Null => Ok(None),
                    v => Ok(Some(MetaValue::Json(v))),
                },
                None => Err(SiltError::MissingValue(kind)),
            },
        }
    }
}

impl From<Value> for MetaValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Number(n) => match n.as_f64() {
                Some(x) => MetaValue::Real(x),
                None => MetaValue::Json(Value::Number(n)),
            },
            Value::String(s) => MetaValue::Text(s),
            other => MetaValue::Json(other),
        }
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self { MetaValue::Real(v) }
}
impl From<i64> for MetaValue {
    fn from(v: i64) -> Self { MetaValue::Real(v as f64) }
}
impl From<&str> for MetaValue {
    fn from(v: &str) -> Self { MetaValue::Text(v.to_string()) }
}
impl From<String> for MetaValue {
    fn from(v: String) -> Self { MetaValue::Text(v) }
}
impl From<Vec<u8>> for MetaValue {
    fn from(v: Vec<u8>) -> Self { MetaValue::Blob(v) }
}
impl From<&[u8]> for MetaValue {
    fn from(v: &[u8]) -> Self { MetaValue::Blob(v.to_vec()) }
}
impl From<bool> for MetaValue {
    fn from(v: bool) -> Self { MetaValue::Json(Value::Bool(v)) }
}
