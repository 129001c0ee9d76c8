//! DDL cleanup applied to a CREATE TABLE block before parsing.
//!
//! MySQL dumps carry secondary-index definitions and named constraints
//! that trip SQL parsers and carry no relational-integrity meaning for
//! the schema model. This is pure text transformation: re-applying it to
//! already-clean input is a no-op.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Bare `KEY idx (...)` / `INDEX idx (...)` table lines.
    static ref KEY_OR_INDEX_LINE: Regex = Regex::new(r"(?i)^(key|index)\s+`?.+`?\s*\(").unwrap();
    /// `CONSTRAINT `name` FOREIGN KEY (` prefix.
    static ref NAMED_FK_CONSTRAINT: Regex =
        Regex::new(r"(?i)^constraint\s+`?[\w\-]+`?\s+foreign\s+key\s*\(").unwrap();
    /// Comma left dangling before a closing parenthesis after line removal.
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*\)").unwrap();
    /// Doubled comma caused by dropping a line in the middle of a list.
    static ref DOUBLE_COMMA: Regex = Regex::new(r",\s*,").unwrap();
}

/// Make a CREATE TABLE block parser-friendly:
/// - drop `KEY` / `INDEX` lines
/// - strip the name from `CONSTRAINT <name> FOREIGN KEY` (keeps the FK)
/// - collapse commas orphaned by the removals
pub fn normalize_create_table_block(block: &str) -> String {
    let mut kept: Vec<String> = Vec::new();

    for line in block.lines() {
        let s = line.trim();

        if KEY_OR_INDEX_LINE.is_match(s) {
            continue;
        }

        let s = NAMED_FK_CONSTRAINT.replace(s, "FOREIGN KEY (");
        kept.push(s.into_owned());
    }

    let cleaned = kept.join("\n");
    let cleaned = TRAILING_COMMA.replace_all(&cleaned, "\n)");
    let cleaned = DOUBLE_COMMA.replace_all(&cleaned, ",");

    cleaned.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "CREATE TABLE orders (\n  \
        id INT NOT NULL,\n  \
        customer_id INT,\n  \
        PRIMARY KEY (id),\n  \
        KEY `idx_customer` (`customer_id`),\n  \
        CONSTRAINT `fk_orders_customer` FOREIGN KEY (customer_id) REFERENCES customers (id)\n\
        );";

    #[test]
    fn test_drops_key_and_index_lines() {
        let cleaned = normalize_create_table_block(RAW);
        assert!(!cleaned.to_lowercase().contains("idx_customer"));
        assert!(cleaned.contains("PRIMARY KEY (id)"));
    }

    #[test]
    fn test_rewrites_named_constraint() {
        let cleaned = normalize_create_table_block(RAW);
        assert!(!cleaned.to_lowercase().contains("constraint"));
        assert!(cleaned.contains("FOREIGN KEY (customer_id) REFERENCES customers (id)"));
    }

    #[test]
    fn test_collapses_orphaned_commas() {
        let raw = "CREATE TABLE t (\n  a INT,\n  KEY k (a),\n);";
        let cleaned = normalize_create_table_block(raw);
        assert!(!cleaned.contains(",\n)"));
        assert!(!cleaned.contains(",,"));
    }

    #[test]
    fn test_idempotent_on_clean_input() {
        let once = normalize_create_table_block(RAW);
        let twice = normalize_create_table_block(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_plain_block_passes_through() {
        let raw = "CREATE TABLE t (\na INT,\nb TEXT\n);";
        let cleaned = normalize_create_table_block(raw);
        assert_eq!(cleaned, "CREATE TABLE t (\na INT,\nb TEXT\n);");
    }
}
