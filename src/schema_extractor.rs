//! DDL ingestion: raw CREATE TABLE text to a structured [`Schema`].
//!
//! The input is split into statement blocks with a bracket-depth-aware
//! scanner, each block is normalized and parsed independently, and a
//! block that fails to parse is recorded in `Schema::parse_errors`
//! without aborting the batch. Foreign keys are extracted from the
//! original block text with a pattern scan; the structured parser's
//! foreign-key nodes are not reliable across dialects.

use crate::ddl_normalizer::normalize_create_table_block;
use crate::dialect::SqlDialect;
use crate::error::{AssistError, Result};
use crate::schema::{ColumnInfo, ForeignKeyRef, Schema, TableInfo};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::{ColumnOption, Statement, TableConstraint};
use sqlparser::parser::Parser;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Type string used when the parser yields no renderable type.
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

lazy_static! {
    static ref CREATE_TABLE_HEAD: Regex = Regex::new(r"(?is)^\s*create\s+table\b").unwrap();
    static ref FOREIGN_KEY: Regex = Regex::new(
        r#"(?is)foreign\s+key\s*\(([^)]+)\)\s*references\s+[`"]?([\w\-]+)[`"]?\s*\(([^)]+)\)"#
    )
    .unwrap();
}

/// Parse DDL text into a schema. Fails only if zero tables parsed;
/// individual bad statements degrade to recorded parse errors.
pub fn extract_schema(ddl: &str, dialect: SqlDialect) -> Result<Schema> {
    if ddl.trim().is_empty() {
        return Err(AssistError::SchemaParse("empty DDL input".to_string()));
    }

    let mut schema = Schema::new(dialect);

    for block in split_statement_blocks(ddl) {
        if !CREATE_TABLE_HEAD.is_match(&block) {
            continue;
        }
        match parse_create_table_block(&block, dialect) {
            Ok(table) => merge_table(&mut schema, table),
            Err(e) => {
                warn!("skipping unparseable CREATE TABLE block: {}", e);
                schema.parse_errors.push(e.to_string());
            }
        }
    }

    if schema.tables.is_empty() {
        return Err(AssistError::SchemaParse(
            "schema parsing produced 0 tables; paste valid CREATE TABLE statements".to_string(),
        ));
    }

    debug!(
        tables = schema.tables.len(),
        errors = schema.parse_errors.len(),
        "schema extracted"
    );
    Ok(schema)
}

/// Split DDL into statement blocks, tracking parenthesis nesting per
/// line so a semicolon inside a column default or nested type never ends
/// a statement. Single-line comments are skipped before depth counting.
fn split_statement_blocks(ddl: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut depth: i64 = 0;

    for line in ddl.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("--") || trimmed.starts_with('#') {
            continue;
        }

        for ch in line.chars() {
            match ch {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
        }

        current.push_str(line);
        current.push('\n');

        if depth <= 0 && line.trim_end().ends_with(';') {
            let block = current.trim().to_string();
            if !block.is_empty() {
                blocks.push(block);
            }
            current.clear();
            depth = 0;
        }
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        blocks.push(tail);
    }

    blocks
}

fn parse_create_table_block(block: &str, dialect: SqlDialect) -> Result<TableInfo> {
    let normalized = normalize_create_table_block(block);
    let statements = Parser::parse_sql(&*dialect.parser_dialect(), &normalized)
        .map_err(|e| AssistError::SchemaParse(e.to_string()))?;

    let (name, columns, constraints) = statements
        .into_iter()
        .find_map(|statement| match statement {
            Statement::CreateTable {
                name,
                columns,
                constraints,
                ..
            } => Some((name, columns, constraints)),
            _ => None,
        })
        .ok_or_else(|| {
            AssistError::SchemaParse("no CREATE TABLE statement found in block".to_string())
        })?;

    let table_name = name
        .0
        .last()
        .map(|ident| ident.value.trim_matches('`').trim_matches('"').to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AssistError::SchemaParse("CREATE TABLE without a table name".to_string()))?;

    let mut table = TableInfo::new(table_name);

    for column in &columns {
        let rendered = column.data_type.to_string();
        let data_type = if rendered.trim().is_empty() {
            UNKNOWN_TYPE.to_string()
        } else {
            rendered
        };
        table.columns.push(ColumnInfo {
            name: column.name.value.clone(),
            data_type,
        });

        // Inline `PRIMARY KEY` on a column definition.
        let inline_pk = column
            .options
            .iter()
            .any(|opt| matches!(opt.option, ColumnOption::Unique { is_primary: true, .. }));
        if inline_pk {
            table.primary_keys = vec![column.name.value.clone()];
        }
    }

    // Table-level PRIMARY KEY clauses come after the column list, so they
    // overwrite any inline declaration; the last clause wins.
    for constraint in &constraints {
        if let TableConstraint::Unique {
            columns: pk_columns,
            is_primary: true,
            ..
        } = constraint
        {
            let cols = dedup_preserving_order(
                pk_columns
                    .iter()
                    .map(|c| c.value.trim_matches('`').trim_matches('"').to_string()),
            );
            if !cols.is_empty() {
                table.primary_keys = cols;
            }
        }
    }

    // Pattern scan over the original (pre-normalization) block text.
    table.foreign_keys = extract_foreign_keys(block);

    Ok(table)
}

/// Extract `FOREIGN KEY (cols) REFERENCES table (cols)` clauses from a
/// CREATE TABLE block by pattern matching.
pub fn extract_foreign_keys(block: &str) -> Vec<ForeignKeyRef> {
    FOREIGN_KEY
        .captures_iter(block)
        .filter_map(|cap| {
            let constrained_columns = split_ident_list(&cap[1]);
            let referred_table = cap[2].trim().to_string();
            let referred_columns = split_ident_list(&cap[3]);

            if constrained_columns.is_empty() || referred_table.is_empty() || referred_columns.is_empty() {
                return None;
            }
            Some(ForeignKeyRef {
                constrained_columns,
                referred_table,
                referred_columns,
            })
        })
        .collect()
}

/// Split a comma-separated identifier list, stripping quotes and
/// dropping empties and duplicates while preserving first occurrence.
fn split_ident_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(|part| part.trim().trim_matches('`').trim_matches('"').trim().to_string())
        .filter(|part| !part.is_empty() && seen.insert(part.clone()))
        .collect()
}

fn dedup_preserving_order(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

/// Duplicate CREATE TABLE statements for the same name merge into one
/// entry: columns append, primary-key clauses keep last-wins semantics,
/// foreign keys extend.
fn merge_table(schema: &mut Schema, table: TableInfo) {
    match schema.get_table_mut(&table.name) {
        Some(existing) => {
            existing.columns.extend(table.columns);
            if !table.primary_keys.is_empty() {
                existing.primary_keys = table.primary_keys;
            }
            existing.foreign_keys.extend(table.foreign_keys);
        }
        None => schema.tables.push(table),
    }
}
