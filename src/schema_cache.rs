//! Process-wide schema store keyed by `db_key`.
//!
//! One cached schema per key, most-recent upload wins. Replacement is
//! whole-object: readers holding an `Arc` keep the schema they resolved,
//! concurrent readers observe either the old or the new value.

use crate::schema::Schema;
use dashmap::DashMap;
use std::sync::Arc;

pub struct SchemaCache {
    inner: DashMap<String, Arc<Schema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Store a schema under `db_key`, replacing any previous one.
    pub fn put(&self, db_key: impl Into<String>, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.inner.insert(db_key.into(), Arc::clone(&schema));
        schema
    }

    pub fn get(&self, db_key: &str) -> Option<Arc<Schema>> {
        self.inner.get(db_key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqlDialect;
    use crate::schema::TableInfo;

    #[test]
    fn test_last_write_wins() {
        let cache = SchemaCache::new();
        let mut first = Schema::new(SqlDialect::MySql);
        first.tables.push(TableInfo::new("a"));
        let mut second = Schema::new(SqlDialect::MySql);
        second.tables.push(TableInfo::new("b"));

        cache.put("default", first);
        cache.put("default", second);

        let stored = cache.get("default").unwrap();
        assert_eq!(stored.tables[0].name, "b");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = SchemaCache::new();
        assert!(cache.get("nope").is_none());
    }
}
