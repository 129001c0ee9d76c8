//! Sanitation of SQL text returned by a generator, plus row-limit
//! injection and dialect validation.
//!
//! Generator output is untrusted: it may be fenced, wrapped in prose, or
//! contain several statements. [`sanitize_sql`] is the strict path used
//! on generator output (multiple statements are rejected, surfacing the
//! ambiguity); [`extract_sql`] is the lenient path used on user-supplied
//! input, keeping the first statement.

use crate::dialect::SqlDialect;
use crate::error::{AssistError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::parser::Parser;

pub const DEFAULT_ROW_LIMIT: usize = 100;

lazy_static! {
    static ref LEADING_FENCE: Regex = Regex::new(r"^```[\w]*\s*").unwrap();
    static ref TRAILING_FENCE: Regex = Regex::new(r"\s*```$").unwrap();
    static ref SQL_START: Regex = Regex::new(r"(?i)\b(?:with|select|explain)\b").unwrap();
}

/// Remove a leading (optionally tagged) and trailing code fence.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_leading = LEADING_FENCE.replace(trimmed, "");
    let without_trailing = TRAILING_FENCE.replace(without_leading.as_ref(), "");
    without_trailing.trim().to_string()
}

/// Strict sanitation for generator output: strip fences, capture from
/// the first SQL-starting keyword (falling back to the trimmed text),
/// and require exactly one non-empty statement.
pub fn sanitize_sql(raw: &str) -> Result<String> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(AssistError::EmptySql);
    }

    let candidate = match SQL_START.find(&text) {
        Some(m) => &text[m.start()..],
        None => text.as_str(),
    };

    let segments: Vec<&str> = candidate
        .split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.len() {
        0 => Err(AssistError::EmptySql),
        1 => Ok(segments[0].to_string()),
        n => Err(AssistError::MultiStatement(n)),
    }
}

/// Lenient extraction for user-supplied SQL: strip fences and keep the
/// first statement, from the first SQL-starting keyword up to the next
/// terminator. Returns `None` when nothing usable remains.
pub fn extract_sql(text: &str) -> Option<String> {
    let stripped = strip_fences(text);
    if stripped.is_empty() {
        return None;
    }

    let candidate = match SQL_START.find(&stripped) {
        Some(m) => {
            let rest = &stripped[m.start()..];
            match rest.find(';') {
                Some(end) => &rest[..end],
                None => rest,
            }
        }
        None => stripped.as_str(),
    };

    let cleaned = candidate.trim().trim_matches(';').trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Append `LIMIT <default_limit>` to a read-only selection query that
/// does not already carry a row limit. Statements the parser cannot
/// parse, or that are not selection queries, pass through unchanged;
/// sanitation never fails for an already-invalid statement.
pub fn enforce_limit(sql: &str, dialect: SqlDialect, default_limit: usize) -> String {
    let s = sql.trim().trim_end_matches(';').trim().to_string();

    let statements = match Parser::parse_sql(&*dialect.parser_dialect(), &s) {
        Ok(statements) => statements,
        Err(_) => return s,
    };

    let is_selection = matches!(statements.as_slice(), [Statement::Query(_)]);
    if is_selection && !s.to_lowercase().contains("limit") {
        format!("{} LIMIT {}", s, default_limit)
    } else {
        s
    }
}

/// Submit the final candidate to the dialect parser. Failure carries the
/// dialect name and the parser's message verbatim.
pub fn validate_sql(sql: &str, dialect: SqlDialect) -> Result<()> {
    Parser::parse_sql(&*dialect.parser_dialect(), sql).map_err(|e| {
        AssistError::DialectValidation {
            dialect: dialect.to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_round_trip() {
        let sql = sanitize_sql("```sql\nSELECT id FROM t;\n```").unwrap();
        assert_eq!(sql, "SELECT id FROM t");
    }

    #[test]
    fn test_untagged_fence() {
        let sql = sanitize_sql("```\nSELECT 1\n```").unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn test_prose_prefix_is_dropped() {
        let sql = sanitize_sql("Here is the query you asked for:\nSELECT name FROM users").unwrap();
        assert_eq!(sql, "SELECT name FROM users");
    }

    #[test]
    fn test_multi_statement_is_rejected() {
        assert!(matches!(
            sanitize_sql("SELECT 1; SELECT 2"),
            Err(AssistError::MultiStatement(2))
        ));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(sanitize_sql(""), Err(AssistError::EmptySql)));
        assert!(matches!(sanitize_sql("```\n```"), Err(AssistError::EmptySql)));
    }

    #[test]
    fn test_no_keyword_falls_back_to_trimmed_text() {
        let out = sanitize_sql("SHOW TABLES").unwrap();
        assert_eq!(out, "SHOW TABLES");
    }

    #[test]
    fn test_with_statement_is_recognized() {
        let sql = sanitize_sql("Sure!\nWITH top AS (SELECT 1) SELECT * FROM top;").unwrap();
        assert!(sql.starts_with("WITH top AS"));
    }

    #[test]
    fn test_extract_sql_keeps_first_statement() {
        let sql = extract_sql("SELECT 1; SELECT 2").unwrap();
        assert_eq!(sql, "SELECT 1");
        assert!(extract_sql("   ").is_none());
    }

    #[test]
    fn test_limit_injected_for_plain_select() {
        let out = enforce_limit("SELECT id FROM t", SqlDialect::MySql, 100);
        assert_eq!(out, "SELECT id FROM t LIMIT 100");
    }

    #[test]
    fn test_existing_limit_is_untouched() {
        let out = enforce_limit("SELECT id FROM t LIMIT 10", SqlDialect::MySql, 100);
        assert_eq!(out, "SELECT id FROM t LIMIT 10");
    }

    #[test]
    fn test_unparseable_statement_passes_through() {
        let out = enforce_limit("SELECT * FROM", SqlDialect::MySql, 100);
        assert_eq!(out, "SELECT * FROM");
    }

    #[test]
    fn test_non_selection_passes_through() {
        let out = enforce_limit("EXPLAIN SELECT id FROM t", SqlDialect::MySql, 100);
        assert_eq!(out, "EXPLAIN SELECT id FROM t");
    }

    #[test]
    fn test_trailing_semicolon_stripped_before_limit() {
        let out = enforce_limit("SELECT id FROM t;", SqlDialect::MySql, 25);
        assert_eq!(out, "SELECT id FROM t LIMIT 25");
    }

    #[test]
    fn test_validate_sql_carries_dialect_and_message() {
        let err = validate_sql("SELEC id FROM t", SqlDialect::MySql).unwrap_err();
        match err {
            AssistError::DialectValidation { dialect, message } => {
                assert_eq!(dialect, "mysql");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_validate_sql_accepts_valid_query() {
        assert!(validate_sql("SELECT id FROM t WHERE id > 3", SqlDialect::MySql).is_ok());
    }
}
