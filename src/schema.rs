//! Structured schema model extracted from DDL.
//!
//! One `Schema` per uploaded database, tables kept in DDL order so that
//! shortlist fallbacks and tie-breaks stay deterministic. Table names are
//! stored case-preserved and resolved case-insensitively.

use crate::dialect::SqlDialect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Foreign-key clause as declared in the DDL. The referred table may not
/// exist in the schema; consumers must tolerate dangling references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub constrained_columns: Vec<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    /// Columns in declaration order. Duplicate names are retained.
    pub columns: Vec<ColumnInfo>,
    /// Last PRIMARY KEY clause wins.
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<TableInfo>,
    #[serde(default)]
    pub dialect: SqlDialect,
    /// Statements that failed to parse during ingestion. The schema is
    /// still usable as long as at least one table parsed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<String>,
}

impl Schema {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            tables: Vec::new(),
            dialect,
            parse_errors: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Exact-name lookup against the stored (case-preserved) table names.
    pub fn get_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableInfo> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Resolve a user-supplied table name to the exact stored key,
    /// comparing case-insensitively and ignoring quoting characters.
    pub fn resolve_table_name(&self, name: &str) -> Option<&str> {
        let wanted = strip_ident_quotes(name).to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.tables
            .iter()
            .find(|t| strip_ident_quotes(&t.name).to_lowercase() == wanted)
            .map(|t| t.name.as_str())
    }

    /// Case-insensitive lookup combining resolution and retrieval.
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        let resolved = self.resolve_table_name(name)?;
        self.get_table(resolved)
    }
}

/// Strip backtick and double-quote identifier quoting.
pub fn strip_ident_quotes(name: &str) -> &str {
    name.trim().trim_matches('`').trim_matches('"').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        let mut schema = Schema::new(SqlDialect::MySql);
        let mut orders = TableInfo::new("Orders");
        orders.columns.push(ColumnInfo {
            name: "id".to_string(),
            data_type: "INT".to_string(),
        });
        schema.tables.push(orders);
        schema.tables.push(TableInfo::new("customers"));
        schema
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let schema = sample_schema();
        assert_eq!(schema.resolve_table_name("orders"), Some("Orders"));
        assert_eq!(schema.resolve_table_name("ORDERS"), Some("Orders"));
        assert_eq!(schema.resolve_table_name("`orders`"), Some("Orders"));
        assert_eq!(schema.resolve_table_name("missing"), None);
    }

    #[test]
    fn test_resolve_preserves_stored_case() {
        let schema = sample_schema();
        let resolved = schema.resolve_table_name("customers").unwrap();
        assert_eq!(resolved, "customers");
        assert!(schema.table("CUSTOMERS").is_some());
    }

    #[test]
    fn test_strip_ident_quotes() {
        assert_eq!(strip_ident_quotes("`orders`"), "orders");
        assert_eq!(strip_ident_quotes("\"orders\""), "orders");
        assert_eq!(strip_ident_quotes("  orders "), "orders");
    }
}
