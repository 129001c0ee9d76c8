//! Destructive-statement gate applied to every SQL candidate.
//!
//! A statement carrying any data-mutating keyword is rejected whole; the
//! keyword is never stripped out of an otherwise-kept statement.

use crate::error::{AssistError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DANGEROUS: Regex =
        Regex::new(r"(?i)\b(drop|delete|truncate|alter|update|insert|create)\b").unwrap();
}

/// Pass the statement through unchanged, or fail naming the first
/// forbidden keyword found (whole-word, case-insensitive).
pub fn enforce_safety(sql: &str) -> Result<&str> {
    if let Some(found) = DANGEROUS.find(sql) {
        return Err(AssistError::UnsafeSql(found.as_str().to_uppercase()));
    }
    Ok(sql)
}
