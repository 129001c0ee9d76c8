//! SQL assistant orchestration.
//!
//! Ties the pipeline together: schema upload and caching, shortlist,
//! prompt construction, generation, and the sanitize / safety / limit /
//! validate steps applied to everything the generator returns. This is
//! the only layer that awaits the generator; all other work is
//! synchronous and request-local.

use crate::assistant_prompts::{
    build_explain_user_prompt, build_fix_user_prompt, build_generate_user_prompt,
    build_optimize_user_prompt, build_suggest_user_prompt, explain_system_prompt,
    fix_system_prompt, generate_system_prompt, optimize_system_prompt, suggest_system_prompt,
};
use crate::dialect::SqlDialect;
use crate::error::{AssistError, Result};
use crate::join_graph::{build_fk_edges, edge_to_join_sql, find_join_paths, render_join_chain, FkEdge, DEFAULT_MAX_JOIN_DEPTH};
use crate::llm::TextGenerator;
use crate::safety_guardrails::enforce_safety;
use crate::schema::Schema;
use crate::schema_cache::SchemaCache;
use crate::schema_extractor::extract_schema;
use crate::schema_shortlist::shortlist_schema;
use crate::semantic_column_resolver::find_closest_column;
use crate::sql_sanitizer::{
    enforce_limit, extract_sql, sanitize_sql, strip_fences, validate_sql, DEFAULT_ROW_LIMIT,
};
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

lazy_static! {
    static ref UNKNOWN_COLUMN: Regex = Regex::new(r"(?i)Unknown column '([^']+)'").unwrap();
    static ref FROM_TABLE: Regex = Regex::new(r"(?i)\bfrom\s+([a-zA-Z_][a-zA-Z0-9_]*)").unwrap();
    static ref SELECT_STAR: Regex = Regex::new(r"(?i)\bselect\s+\*|\b\w+\.\*").unwrap();
}

fn default_db_key() -> String {
    "default".to_string()
}

fn default_max_rows() -> usize {
    DEFAULT_ROW_LIMIT
}

fn default_suggestions() -> usize {
    8
}

fn default_join_suggestions() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSchemaRequest {
    #[serde(default = "default_db_key")]
    pub db_key: String,
    /// Pasted CREATE TABLE statements.
    #[serde(default)]
    pub schema_sql: Option<String>,
    /// Pre-structured schema document, as an alternative to DDL.
    #[serde(default)]
    pub schema_json: Option<Schema>,
    #[serde(default)]
    pub database_type: SqlDialect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSchemaResponse {
    pub status: String,
    pub db_key: String,
    pub tables: usize,
    /// Statements that failed to parse; the schema is still usable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text2SqlRequest {
    #[serde(default = "default_db_key")]
    pub db_key: String,
    pub question: String,
    #[serde(default)]
    pub constraints: Option<String>,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlResponse {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixSqlRequest {
    #[serde(default = "default_db_key")]
    pub db_key: String,
    pub sql: String,
    /// Engine error message, when the caller has one.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainSqlRequest {
    pub sql: String,
    #[serde(default)]
    pub dialect: SqlDialect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeSqlRequest {
    #[serde(default = "default_db_key")]
    pub db_key: String,
    pub sql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestNextRequest {
    #[serde(default = "default_db_key")]
    pub db_key: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    /// First few result rows as a JSON string, when the UI has them.
    #[serde(default)]
    pub sample_rows_json: Option<String>,
    #[serde(default = "default_suggestions")]
    pub max_suggestions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedQuery {
    pub sql: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestNextResponse {
    pub queries: Vec<SuggestedQuery>,
    pub joins: Vec<String>,
    pub checks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestJoinsRequest {
    #[serde(default = "default_db_key")]
    pub db_key: String,
    /// Suggest direct joins among these tables.
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    /// Or: find join paths from one table to another.
    #[serde(default)]
    pub from_table: Option<String>,
    #[serde(default)]
    pub to_table: Option<String>,
    #[serde(default = "default_join_suggestions")]
    pub max_suggestions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestJoinsResponse {
    /// Human-friendly join clauses.
    pub joins: Vec<String>,
    /// Structured edges for UI use.
    pub graph_edges: Vec<FkEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

pub struct DataAssistant {
    generator: Arc<dyn TextGenerator>,
    cache: Arc<SchemaCache>,
    default_limit: usize,
}

impl DataAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>, cache: Arc<SchemaCache>) -> Self {
        Self {
            generator,
            cache,
            default_limit: DEFAULT_ROW_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Ingest a schema (DDL or pre-structured JSON) and cache it under
    /// `db_key`, replacing any previous upload for that key.
    pub fn upload_schema(&self, request: UploadSchemaRequest) -> Result<UploadSchemaResponse> {
        let schema = match (request.schema_json, request.schema_sql) {
            (Some(schema), _) => schema,
            (None, Some(ddl)) => extract_schema(&ddl, request.database_type)?,
            (None, None) => {
                return Err(AssistError::SchemaParse(
                    "provide schema_sql or schema_json".to_string(),
                ))
            }
        };

        if schema.tables.is_empty() {
            return Err(AssistError::SchemaParse(
                "schema contains no tables".to_string(),
            ));
        }

        let warnings = schema.parse_errors.clone();
        let tables = schema.tables.len();
        self.cache.put(request.db_key.clone(), schema);
        info!(db_key = %request.db_key, tables, "schema uploaded");

        Ok(UploadSchemaResponse {
            status: "ok".to_string(),
            db_key: request.db_key,
            tables,
            warnings,
        })
    }

    fn require_schema(&self, db_key: &str) -> Result<Arc<Schema>> {
        self.cache
            .get(db_key)
            .ok_or_else(|| AssistError::SchemaNotFound(db_key.to_string()))
    }

    /// Turn a natural-language question into one validated, limit-capped,
    /// read-only SQL statement.
    pub async fn generate_sql(&self, request: Text2SqlRequest) -> Result<SqlResponse> {
        let schema = self.require_schema(&request.db_key)?;
        let subset = shortlist_schema(&schema, &request.question, 8);

        let request_id = Uuid::new_v4();
        info!(%request_id, db_key = %request.db_key, "generating SQL");

        let user_prompt = build_generate_user_prompt(
            &request.question,
            &subset,
            request.constraints.as_deref(),
            request.max_rows,
        );
        let raw = self
            .generator
            .complete(&generate_system_prompt(schema.dialect), &user_prompt)
            .await?;

        let sql = sanitize_sql(&raw)?;
        enforce_safety(&sql)?;
        let sql = enforce_limit(&sql, schema.dialect, request.max_rows);
        validate_sql(&sql, schema.dialect)?;

        Ok(SqlResponse {
            sql,
            notes: Some(format!(
                "Generated from schema shortlist ({} dialect).",
                schema.dialect
            )),
        })
    }

    /// Repair a broken statement: deterministic unknown-column patching
    /// first, then one generator pass with a single retry on empty output.
    pub async fn fix_sql(&self, request: FixSqlRequest) -> Result<SqlResponse> {
        let schema = self.require_schema(&request.db_key)?;
        let mut sql_in = extract_sql(&request.sql).ok_or(AssistError::EmptySql)?;
        let mut error_msg = request.error.unwrap_or_default().trim().to_string();

        let request_id = Uuid::new_v4();
        info!(%request_id, db_key = %request.db_key, "fixing SQL");

        // When the engine named the unknown column, patch it directly
        // before spending a generator call.
        if let Some(bad_column) = UNKNOWN_COLUMN
            .captures(&error_msg)
            .map(|cap| cap[1].to_string())
        {
            if let Some(table) = FROM_TABLE.captures(&sql_in).map(|cap| cap[1].to_string()) {
                if let Some(replacement) = find_closest_column(&schema, &table, &bad_column) {
                    if !replacement.eq_ignore_ascii_case(&bad_column) {
                        if let Ok(pattern) =
                            Regex::new(&format!(r"\b{}\b", regex::escape(&bad_column)))
                        {
                            info!(%request_id, bad = %bad_column, replacement = %replacement, "patched unknown column");
                            sql_in = pattern
                                .replace_all(&sql_in, regex::NoExpand(replacement.as_str()))
                                .into_owned();
                        }
                    }
                }
            }
        }

        let shortlist_text = format!("{}\n{}", sql_in, error_msg);
        let subset = shortlist_schema(&schema, &shortlist_text, 10);

        if error_msg.is_empty() {
            error_msg = match validate_sql(&sql_in, schema.dialect) {
                Ok(()) => {
                    "SQL may be valid but needs a compatibility/intent-preserving fix.".to_string()
                }
                Err(e) => format!("Parse error: {}", e),
            };
        }

        let system = fix_system_prompt(schema.dialect);
        let raw_first = self
            .generator
            .complete(&system, &build_fix_user_prompt(&sql_in, &error_msg, &subset))
            .await?;

        let (raw_used, sql) = match extract_sql(&raw_first) {
            Some(sql) => (raw_first, sql),
            None => {
                warn!(%request_id, "fixer returned empty output, retrying once");
                let retry_error = format!(
                    "{} IMPORTANT: Output ONLY a single non-empty {} query. No fences. No commentary.",
                    error_msg,
                    schema.dialect.display_name()
                );
                let raw_second = self
                    .generator
                    .complete(&system, &build_fix_user_prompt(&sql_in, &retry_error, &subset))
                    .await?;
                match extract_sql(&raw_second) {
                    Some(sql) => (raw_second, sql),
                    None => {
                        return Err(AssistError::Generation(format!(
                            "fixer returned empty SQL. Raw: {}",
                            truncate(&raw_second, 300)
                        )))
                    }
                }
            }
        };

        enforce_safety(&sql)?;
        let sql = enforce_limit(&sql, schema.dialect, self.default_limit);
        validate_sql(&sql, schema.dialect).map_err(|e| match e {
            AssistError::DialectValidation { dialect, message } => {
                AssistError::DialectValidation {
                    dialect,
                    message: format!("{}. Raw output: {}", message, truncate(&raw_used, 300)),
                }
            }
            other => other,
        })?;

        Ok(SqlResponse {
            sql,
            notes: Some("Fixed via deterministic column map + generator (retry-on-empty).".to_string()),
        })
    }

    /// Explain a statement for a business user. The statement is gated
    /// and validated first; it is never modified.
    pub async fn explain_sql(&self, request: ExplainSqlRequest) -> Result<ExplainResponse> {
        let sql = extract_sql(&request.sql).ok_or(AssistError::EmptySql)?;
        enforce_safety(&sql)?;
        validate_sql(&sql, request.dialect)?;

        let raw = self
            .generator
            .complete(&explain_system_prompt(), &build_explain_user_prompt(&sql))
            .await?;

        Ok(ExplainResponse {
            explanation: raw.trim().to_string(),
        })
    }

    /// Rewrite a statement for performance with identical intent. The
    /// result must still validate and may not select `*`.
    pub async fn optimize_sql(&self, request: OptimizeSqlRequest) -> Result<SqlResponse> {
        let schema = self.require_schema(&request.db_key)?;
        let sql_in = extract_sql(&request.sql).ok_or(AssistError::EmptySql)?;
        enforce_safety(&sql_in)?;
        validate_sql(&sql_in, schema.dialect)?;

        let subset = shortlist_schema(&schema, &sql_in, 10);
        let system = optimize_system_prompt(schema.dialect);

        let raw_first = self
            .generator
            .complete(&system, &build_optimize_user_prompt(&sql_in, &subset))
            .await?;

        let sql = match extract_sql(&raw_first) {
            Some(sql) => sql,
            None => {
                let strengthened = format!(
                    "{}\n\nIMPORTANT: Output only a single non-empty {} query. No fences. No commentary.",
                    sql_in,
                    schema.dialect.display_name()
                );
                let raw_second = self
                    .generator
                    .complete(&system, &build_optimize_user_prompt(&strengthened, &subset))
                    .await?;
                extract_sql(&raw_second).ok_or_else(|| {
                    AssistError::Generation(format!(
                        "optimizer returned empty SQL. Raw: {}",
                        truncate(&raw_second, 300)
                    ))
                })?
            }
        };

        enforce_safety(&sql)?;
        validate_sql(&sql, schema.dialect)?;

        if SELECT_STAR.is_match(&sql) {
            return Err(AssistError::Generation(format!(
                "optimizer violated rule (SELECT *). Raw output: {}",
                truncate(&raw_first, 300)
            )));
        }

        Ok(SqlResponse {
            sql,
            notes: Some("Optimized with explicit columns (no SELECT *).".to_string()),
        })
    }

    /// Propose follow-up queries, join hints, and data-quality checks as
    /// structured JSON recovered tolerantly from the generator output.
    pub async fn suggest_next(&self, request: SuggestNextRequest) -> Result<SuggestNextResponse> {
        let schema = self.require_schema(&request.db_key)?;
        let shortlist_text = format!(
            "{}\n{}\n{}",
            request.question.as_deref().unwrap_or(""),
            request.sql.as_deref().unwrap_or(""),
            request.sample_rows_json.as_deref().unwrap_or("")
        );
        let subset = shortlist_schema(&schema, &shortlist_text, 12);

        let user_prompt = build_suggest_user_prompt(
            &subset,
            request.question.as_deref(),
            request.sql.as_deref(),
            request.sample_rows_json.as_deref(),
            request.max_suggestions,
        );

        let raw = self
            .generator
            .complete(&suggest_system_prompt(schema.dialect), &user_prompt)
            .await?;
        let data = safe_parse_json(&raw)?;

        let raw_queries = data
            .get("queries")
            .or_else(|| data.get("suggestions"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut queries = Vec::new();
        for (i, entry) in raw_queries.iter().enumerate() {
            if let Some(sql) = entry.as_str() {
                queries.push(SuggestedQuery {
                    sql: sql.to_string(),
                    title: format!("Suggestion {}", i + 1),
                });
            } else if let Some(sql) = entry.get("sql").and_then(|v| v.as_str()) {
                let title = entry
                    .get("title")
                    .and_then(|v| v.as_str())
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| format!("Suggestion {}", i + 1));
                queries.push(SuggestedQuery {
                    sql: sql.to_string(),
                    title,
                });
            }
        }

        let string_list = |key: &str, cap: usize| -> Vec<String> {
            data.get(key)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .take(cap)
                        .collect()
                })
                .unwrap_or_default()
        };

        queries.truncate(request.max_suggestions);
        let joins = string_list("joins", 8);
        let checks = string_list("checks", 8);

        let notes = format!(
            "Generated {} suggestions based on k={}",
            queries.len(),
            request.max_suggestions
        );

        Ok(SuggestNextResponse {
            queries,
            joins,
            checks,
            notes: Some(notes),
        })
    }

    /// Suggest joins, in one of three modes: a join path between two
    /// named tables, direct FK joins among a provided table set, or all
    /// direct FK joins in the schema.
    pub fn suggest_joins(&self, request: SuggestJoinsRequest) -> Result<SuggestJoinsResponse> {
        let schema = self.require_schema(&request.db_key)?;
        let max = request.max_suggestions;

        if let (Some(from_table), Some(to_table)) = (&request.from_table, &request.to_table) {
            let from = schema
                .resolve_table_name(from_table)
                .ok_or_else(|| AssistError::UnknownTable(from_table.clone()))?
                .to_string();
            let to = schema
                .resolve_table_name(to_table)
                .ok_or_else(|| AssistError::UnknownTable(to_table.clone()))?
                .to_string();

            let paths = find_join_paths(&schema, &from, &to, DEFAULT_MAX_JOIN_DEPTH)?;
            let mut joins = Vec::new();
            let mut graph_edges = Vec::new();
            for path in paths.iter().take(max) {
                joins.push(render_join_chain(&from, path));
                graph_edges.extend(path.iter().cloned());
            }
            graph_edges.truncate(max);

            return Ok(SuggestJoinsResponse {
                joins,
                graph_edges,
                notes: Some("Join paths derived from foreign-key graph.".to_string()),
            });
        }

        let edges = build_fk_edges(&schema);

        if let Some(tables) = &request.tables {
            let resolved: Vec<String> = tables
                .iter()
                .filter_map(|t| schema.resolve_table_name(t).map(|r| r.to_string()))
                .collect();
            if resolved.len() < 2 {
                return Err(AssistError::UnknownTable(
                    "provide at least two tables present in the schema".to_string(),
                ));
            }

            let mut joins = Vec::new();
            let mut graph_edges = Vec::new();
            for edge in &edges {
                if resolved.contains(&edge.from_table) && resolved.contains(&edge.to_table) {
                    joins.push(edge_to_join_sql(edge, "a", "b"));
                    graph_edges.push(edge.clone());
                }
            }
            let joins: Vec<String> = joins.into_iter().unique().take(max).collect();
            graph_edges.truncate(max);

            return Ok(SuggestJoinsResponse {
                joins,
                graph_edges,
                notes: Some("Direct FK joins among provided tables.".to_string()),
            });
        }

        let graph_edges: Vec<FkEdge> = edges.into_iter().take(max).collect();
        let joins = graph_edges
            .iter()
            .map(|edge| edge_to_join_sql(edge, "a", "b"))
            .collect();

        Ok(SuggestJoinsResponse {
            joins,
            graph_edges,
            notes: Some("Direct FK joins from schema.".to_string()),
        })
    }
}

/// Recover a JSON object from generator output: fences stripped, direct
/// parse first, then the outermost brace-delimited span.
fn safe_parse_json(text: &str) -> Result<serde_json::Value> {
    let stripped = strip_fences(text);
    if let Ok(value) = serde_json::from_str(&stripped) {
        return Ok(value);
    }
    if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str(&stripped[start..=end]) {
                return Ok(value);
            }
        }
    }
    Err(AssistError::Generation(format!(
        "no JSON object found in suggestions output: {}",
        truncate(&stripped, 120)
    )))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
