use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::value::ValueKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SiltError>;

#[derive(Debug)]
pub enum SiltError {
    /// A record buffer or stored JSON payload could not be (de)serialized.
    Malformed(serde_json::Error),
    Sqlite(rusqlite::Error),
    /// A name/id pair collides with an already-registered meta key.
    KeyConflict { name: String, id: i64 },
    /// A stored meta row's type tag selects a value slot that is NULL.
    MissingValue(ValueKind),
    /// A stored meta row carries a type tag outside the known set.
    UnknownKind(i64),
}

impl std::error::Error for SiltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SiltError::Malformed(e)       => Some(e),
            SiltError::Sqlite(e)          => Some(e),
            SiltError::KeyConflict { .. } => None,
            SiltError::MissingValue(_)    => None,
            SiltError::UnknownKind(_)     => None,
        }
    }
}

impl From<serde_json::Error> for SiltError {
    fn from(e: serde_json::Error) -> Self { SiltError::Malformed(e) }
}
impl From<rusqlite::Error> for SiltError {
    fn from(e: rusqlite::Error) -> Self { SiltError::Sqlite(e) }
}

impl Display for SiltError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SiltError::Malformed(e) => write!(f, "JSON error: {}", e),
            SiltError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            SiltError::KeyConflict { name, id } => {
                write!(f, "meta key {:?} already registered with id {}", name, id)
            }
            SiltError::MissingValue(kind) => {
                write!(f, "no value stored for a row tagged {}", kind.as_str())
            }
            SiltError::UnknownKind(seq) => write!(f, "unknown value type tag {}", seq),
        }
    }
}
