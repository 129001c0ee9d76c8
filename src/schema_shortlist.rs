//! Relevance shortlist bounding the schema context fed to generation.
//!
//! Tables are scored by token overlap between the free text and the
//! table's own vocabulary (its name plus column names). Selected tables
//! keep all of their column, primary-key, and foreign-key data.

use crate::schema::{Schema, TableInfo};
use std::collections::HashSet;
use tracing::debug;

/// Lowercase alphabetic runs; digits and punctuation separate tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn table_vocabulary(table: &TableInfo) -> HashSet<String> {
    let mut vocabulary = HashSet::new();
    let name = table.name.to_lowercase();
    vocabulary.extend(tokenize(&name));
    vocabulary.insert(name);
    for column in &table.columns {
        let column_name = column.name.to_lowercase();
        vocabulary.extend(tokenize(&column_name));
        vocabulary.insert(column_name);
    }
    vocabulary
}

/// Whether a query token counts against a vocabulary entry. Besides
/// equality, a prefix relation is accepted so singular/plural pairs like
/// "customer"/"customers" still match; the three-character floor keeps
/// stopword-sized tokens from matching everything.
fn token_matches(query_token: &str, vocab_token: &str) -> bool {
    if query_token == vocab_token {
        return true;
    }
    let shorter = query_token.len().min(vocab_token.len());
    shorter >= 3
        && (vocab_token.starts_with(query_token) || query_token.starts_with(vocab_token))
}

/// Reduce a schema to the `max_tables` tables most relevant to `text`.
/// Tables with zero score are dropped; if nothing scores, the first
/// `max_tables` tables in schema order are returned instead so the
/// shortlist is never empty for a non-empty schema.
pub fn shortlist_schema(schema: &Schema, text: &str, max_tables: usize) -> Schema {
    let query: HashSet<String> = tokenize(text).into_iter().collect();

    let mut scored: Vec<(usize, &TableInfo)> = Vec::new();
    for table in &schema.tables {
        let vocabulary = table_vocabulary(table);
        let score = query
            .iter()
            .filter(|q| vocabulary.iter().any(|v| token_matches(q, v)))
            .count();
        if score > 0 {
            scored.push((score, table));
        }
    }

    // Stable sort: ties keep schema (DDL) order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut chosen: Vec<TableInfo> = scored
        .into_iter()
        .take(max_tables)
        .map(|(_, table)| table.clone())
        .collect();

    if chosen.is_empty() {
        chosen = schema.tables.iter().take(max_tables).cloned().collect();
    }

    debug!(
        selected = chosen.len(),
        total = schema.tables.len(),
        "schema shortlisted"
    );

    Schema {
        tables: chosen,
        dialect: schema.dialect,
        parse_errors: Vec::new(),
    }
}
