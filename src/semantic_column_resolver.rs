//! Best-effort column resolution for repairing "unknown column" errors.
//!
//! Given a column name the engine rejected, find the most plausible
//! existing column in the target table. Tried in order: case-insensitive
//! exact match, bidirectional substring match, then highest shared
//! alphabetic-token count (first candidate wins ties).

use crate::schema::Schema;
use crate::schema_shortlist::tokenize;
use std::collections::HashSet;

pub fn find_closest_column(schema: &Schema, table_name: &str, bad_column: &str) -> Option<String> {
    let table = schema.table(table_name)?;
    if table.columns.is_empty() {
        return None;
    }

    let bad = bad_column.to_lowercase();

    for column in &table.columns {
        if column.name.to_lowercase() == bad {
            return Some(column.name.clone());
        }
    }

    for column in &table.columns {
        let candidate = column.name.to_lowercase();
        if candidate.contains(&bad) || bad.contains(&candidate) {
            return Some(column.name.clone());
        }
    }

    let bad_tokens: HashSet<String> = tokenize(&bad).into_iter().collect();
    let mut best: Option<String> = None;
    let mut best_score = 0usize;
    for column in &table.columns {
        let candidate_tokens: HashSet<String> =
            tokenize(&column.name.to_lowercase()).into_iter().collect();
        let score = bad_tokens.intersection(&candidate_tokens).count();
        if score > best_score {
            best_score = score;
            best = Some(column.name.clone());
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqlDialect;
    use crate::schema::{ColumnInfo, TableInfo};

    fn schema() -> Schema {
        let mut schema = Schema::new(SqlDialect::MySql);
        let mut orders = TableInfo::new("orders");
        for name in ["order_id", "customer_id", "total_amount"] {
            orders.columns.push(ColumnInfo {
                name: name.to_string(),
                data_type: "INT".to_string(),
            });
        }
        schema.tables.push(orders);
        schema.tables.push(TableInfo::new("empty_table"));
        schema
    }

    #[test]
    fn test_exact_match_wins() {
        let schema = schema();
        assert_eq!(
            find_closest_column(&schema, "orders", "TOTAL_AMOUNT"),
            Some("total_amount".to_string())
        );
    }

    #[test]
    fn test_substring_match() {
        let schema = schema();
        assert_eq!(
            find_closest_column(&schema, "orders", "customer"),
            Some("customer_id".to_string())
        );
    }

    #[test]
    fn test_token_overlap_resolves_typo() {
        let schema = schema();
        assert_eq!(
            find_closest_column(&schema, "orders", "totl_amount"),
            Some("total_amount".to_string())
        );
    }

    #[test]
    fn test_unknown_table_returns_none() {
        let schema = schema();
        assert_eq!(find_closest_column(&schema, "missing", "anything"), None);
    }

    #[test]
    fn test_table_without_columns_returns_none() {
        let schema = schema();
        assert_eq!(find_closest_column(&schema, "empty_table", "x"), None);
    }

    #[test]
    fn test_no_signal_returns_none() {
        let schema = schema();
        assert_eq!(find_closest_column(&schema, "orders", "zzz"), None);
    }

    #[test]
    fn test_table_name_resolved_case_insensitively() {
        let schema = schema();
        assert_eq!(
            find_closest_column(&schema, "ORDERS", "totl_amount"),
            Some("total_amount".to_string())
        );
    }
}
