use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;

use crate::error::SiltError;
use crate::schema::MetaKeys;
use crate::value::MetaValue;

/// Criteria for [`entries`](crate::LogWriter::entries). Every criterion is
/// optional; present criteria combine with AND, the alternatives inside a
/// single criterion combine with OR.
///
/// ```no_run
/// use silt::EntryFilter;
///
/// let filter = EntryFilter::new()
///     .with_level("error")
///     .with_meta_key("request_id")
///     .with_meta_filter("user", "u1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    level: Option<String>,
    session: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    selected_meta_keys: Vec<String>,
    meta_filters: BTreeMap<String, MetaValue>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep entries whose level matches exactly.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Keep entries whose session matches exactly.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Keep entries dated at or after `from`.
    pub fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Keep entries dated at or before `to`.
    pub fn with_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Keep entries that carry a meta row for `name`, interned or not.
    /// Repeated calls accumulate; any one match keeps the entry.
    pub fn with_meta_key(mut self, name: impl Into<String>) -> Self {
        self.selected_meta_keys.push(name.into());
        self
    }

    /// Keep entries that carry a meta row for `name` holding `value`. The
    /// value's kind picks the compared column. Repeated calls accumulate;
    /// any one match keeps the entry.
    pub fn with_meta_filter(mut self, name: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta_filters.insert(name.into(), value.into());
        self
    }

    /// Assembles the WHERE fragments and their parameters. Names that
    /// resolve through the registry are matched by `meta_key_id`, the rest
    /// by the literal `name` column. Any criterion touching meta rows
    /// requires the entry query to join `log_entries_meta` as `lem`.
    pub(crate) fn clauses(&self, keys: &MetaKeys) -> Result<FilterClauses, SiltError> {
        let mut out = FilterClauses::default();

        if let Some(level) = &self.level {
            out.conditions.push("le.level = ?".to_string());
            out.params.push(Box::new(level.clone()));
        }
        if let Some(session) = &self.session {
            out.conditions.push("le.session = ?".to_string());
            out.params.push(Box::new(session.clone()));
        }
        if let Some(from) = self.from {
            out.conditions.push("le.date >= ?".to_string());
            out.params.push(Box::new(from));
        }
        if let Some(to) = self.to {
            out.conditions.push("le.date <= ?".to_string());
            out.params.push(Box::new(to));
        }

        if !self.selected_meta_keys.is_empty() {
            let mut alts = Vec::new();
            for name in &self.selected_meta_keys {
                match keys.get(name) {
                    Some(key) => {
                        alts.push("lem.meta_key_id = ?");
                        out.params.push(Box::new(key.id));
                    }
                    None => {
                        alts.push("lem.name = ?");
                        out.params.push(Box::new(name.clone()));
                    }
                }
            }
            out.conditions.push(format!("({})", alts.join(" OR ")));
            out.joins_meta = true;
        }

        if !self.meta_filters.is_empty() {
            let mut alts = Vec::new();
            for (name, value) in &self.meta_filters {
                let column = value.kind().value_column();
                alts.push(format!("(lem.name = ? AND lem.{} = ?)", column));
                out.params.push(Box::new(name.clone()));
                out.params.push(value_param(value)?);
                if let Some(key) = keys.get(name) {
                    alts.push(format!("(lem.meta_key_id = ? AND lem.{} = ?)", column));
                    out.params.push(Box::new(key.id));
                    out.params.push(value_param(value)?);
                }
            }
            out.conditions.push(format!("({})", alts.join(" OR ")));
            out.joins_meta = true;
        }

        Ok(out)
    }
}

#[derive(Default)]
pub(crate) struct FilterClauses {
    pub(crate) conditions: Vec<String>,
    pub(crate) params: Vec<Box<dyn ToSql>>,
    pub(crate) joins_meta: bool,
}

fn value_param(value: &MetaValue) -> Result<Box<dyn ToSql>, SiltError> {
    Ok(match value {
        MetaValue::Real(x) => Box::new(*x),
        MetaValue::Text(s) => Box::new(s.clone()),
        MetaValue::Blob(b) => Box::new(b.clone()),
        MetaValue::Json(v) => Box::new(serde_json::to_vec(v)?),
    })
}
