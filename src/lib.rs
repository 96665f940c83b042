//! Structured log persistence over SQLite without schema migrations.
//!
//! Records arrive as flat JSON objects with well-known `level` and
//! `session` fields; every other field is stored as one typed
//! entity-attribute-value row and folded back into a map on read.

pub mod error;
pub mod filter;
pub mod query;
pub mod schema;
pub mod value;
pub mod writer;

pub use error::{Result, SiltError};
pub use filter::EntryFilter;
pub use query::LogEntry;
pub use schema::{MetaKey, MetaKeys, Schema};
pub use value::{MetaValue, ValueKind};
pub use writer::LogWriter;
