use std::collections::HashMap;

use crate::error::SiltError;

/// An interned meta key. Frequently used field names are stored by id
/// instead of repeating the full string on every row; a separate table
/// keeps the name/id mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaKey {
    pub name: String,
    pub id: i64,
}

/// Bidirectional name/id interning table for meta keys.
///
/// Ids are handed out sequentially starting at 0. Once a pair is
/// registered it never changes.
#[derive(Debug, Clone, Default)]
pub struct MetaKeys {
    keys: HashMap<String, MetaKey>,
    names_by_id: HashMap<i64, String>,
    next_id: i64,
}

impl MetaKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a meta key by name.
    pub fn get(&self, name: &str) -> Option<&MetaKey> {
        self.keys.get(name)
    }

    /// Looks up a meta key by id.
    pub fn get_by_id(&self, id: i64) -> Option<&MetaKey> {
        self.names_by_id.get(&id).and_then(|name| self.keys.get(name))
    }

    /// Registers `name` under the next free id, or returns the existing
    /// key if the name is already interned.
    pub fn add(&mut self, name: &str) -> MetaKey {
        if let Some(key) = self.keys.get(name) {
            return key.clone();
        }
        let key = MetaKey { name: name.to_string(), id: self.next_id };
        self.next_id += 1;
        self.names_by_id.insert(key.id, key.name.clone());
        self.keys.insert(key.name.clone(), key.clone());
        key
    }

    /// Registers an externally supplied name/id pair, as read back from
    /// the `meta_keys` table. Fails if either side of the pair is already
    /// bound differently; registering the exact same pair again is a no-op.
    pub fn add_with_id(&mut self, name: &str, id: i64) -> Result<MetaKey, SiltError> {
        if let Some(bound) = self.names_by_id.get(&id) {
            if bound != name {
                return Err(SiltError::KeyConflict { name: bound.clone(), id });
            }
        }
        if let Some(key) = self.keys.get(name) {
            if key.id != id {
                return Err(SiltError::KeyConflict { name: name.to_string(), id: key.id });
            }
            return Ok(key.clone());
        }
        let key = MetaKey { name: name.to_string(), id };
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        self.names_by_id.insert(id, key.name.clone());
        self.keys.insert(key.name.clone(), key.clone());
        Ok(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetaKey> {
        self.keys.values()
    }
}

/// The set of interned meta keys a [`LogWriter`](crate::LogWriter) runs
/// with. Constructed empty or pre-seeded by the caller, then persisted
/// and reloaded during initialization.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub meta_keys: MetaKeys,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }
}
