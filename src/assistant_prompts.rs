//! System prompts and user-prompt builders for the SQL assistant.

use crate::dialect::SqlDialect;
use crate::schema::Schema;

pub fn generate_system_prompt(dialect: SqlDialect) -> String {
    format!(
        r#"You are a senior analytics engineer. Generate {dialect} SQL only.
Rules:
- Output ONLY SQL. No markdown. No explanation.
- Use ONLY tables/columns provided in the schema. Never invent names.
- Prefer explicit JOIN conditions using known keys.
- Default to safe read-only SELECT queries.
- Never output destructive statements (DROP/DELETE/UPDATE/INSERT/ALTER/TRUNCATE/CREATE).
- If ambiguous, choose the single best query with reasonable assumptions.
"#,
        dialect = dialect.display_name()
    )
}

pub fn fix_system_prompt(dialect: SqlDialect) -> String {
    format!(
        r#"You are a {dialect} SQL expert. Fix SQL only.

Rules (must follow):
- Output ONLY corrected {dialect} SQL. No markdown. No explanation.
- Preserve the user's intent.
- Use ONLY tables/columns provided in the schema JSON. Never invent names.
- If a column name is wrong, REPLACE it with the closest existing column from the same table (by meaning/name similarity).
- Do NOT replace an unknown column with '*' or remove the column unless absolutely necessary.
- Never output destructive statements (DROP/DELETE/UPDATE/INSERT/ALTER/TRUNCATE/CREATE).
- Always return a non-empty SQL statement.
"#,
        dialect = dialect.display_name()
    )
}

pub fn explain_system_prompt() -> String {
    r#"You are a senior analytics engineer. Explain the SQL for a business user.

Output format (plain text, no markdown):
1) Summary (1-2 lines)
2) What it returns (bullets)
3) Filters/joins (bullets)
4) Assumptions & risks (bullets)
Keep it concise but complete.
Do NOT modify the SQL.
"#
    .to_string()
}

pub fn optimize_system_prompt(dialect: SqlDialect) -> String {
    format!(
        r#"You are a {dialect} performance engineer.

Rules (must follow):
- Output ONLY an improved {dialect} SQL query. No markdown. No explanation.
- Keep results identical to the original query intent.
- Use ONLY tables/columns provided in the schema JSON. Never invent names.
- NEVER use SELECT * or table.* (c.* / o.*). Always select explicit columns.
- Push filters as early as possible and avoid unnecessary columns/joins.
- Never output destructive statements.
- Always return a non-empty SQL statement.
"#,
        dialect = dialect.display_name()
    )
}

pub fn suggest_system_prompt(dialect: SqlDialect) -> String {
    format!(
        r#"You are a senior data analyst copilot for {dialect}.
Given a schema plus the user's last question/SQL/context, propose the next best SQL queries the user might want to run.

Rules:
- Output valid JSON only (no markdown).
- Propose exactly k suggestions if possible.
- Each suggestion must be a high-quality, practical {dialect} query.
- Use only tables/columns that exist in schema.
- Rank them by relevance to the user's current context.
Return JSON with keys:
  - queries: list of objects {{ "sql": "...", "title": "..." }}
  - joins: list of string join hints
  - checks: list of string data quality checks
"#,
        dialect = dialect.display_name()
    )
}

fn schema_json(schema: &Schema) -> String {
    serde_json::to_string_pretty(schema).unwrap_or_else(|_| "{}".to_string())
}

pub fn build_generate_user_prompt(
    question: &str,
    schema_subset: &Schema,
    constraints: Option<&str>,
    limit: usize,
) -> String {
    format!(
        "Question: {question}\nConstraints: {constraints}\nResult limit: {limit}\n\nSchema (JSON):\n{schema}\n\nReturn a single {dialect} query.",
        question = question,
        constraints = constraints.unwrap_or("None"),
        limit = limit,
        schema = schema_json(schema_subset),
        dialect = schema_subset.dialect.display_name()
    )
}

pub fn build_fix_user_prompt(sql: &str, error: &str, schema_subset: &Schema) -> String {
    format!(
        "SQL to fix:\n{sql}\n\nError / problem:\n{error}\n\nSchema (JSON):\n{schema}\n\nReturn ONLY corrected {dialect} SQL.",
        sql = sql,
        error = error,
        schema = schema_json(schema_subset),
        dialect = schema_subset.dialect.display_name()
    )
}

pub fn build_explain_user_prompt(sql: &str) -> String {
    format!("SQL:\n{}\n\nExplain it with bullet points.", sql)
}

pub fn build_optimize_user_prompt(sql: &str, schema_subset: &Schema) -> String {
    format!(
        "SQL:\n{sql}\n\nSchema (JSON):\n{schema}\n\nReturn ONLY optimized {dialect} SQL with same intent.",
        sql = sql,
        schema = schema_json(schema_subset),
        dialect = schema_subset.dialect.display_name()
    )
}

pub fn build_suggest_user_prompt(
    schema_subset: &Schema,
    question: Option<&str>,
    sql: Option<&str>,
    sample_rows_json: Option<&str>,
    k: usize,
) -> String {
    format!(
        "k={k}\n\nLast user question:\n{question}\n\nLast SQL:\n{sql}\n\nOptional sample rows (JSON, may be None):\n{rows}\n\nSchema (JSON):\n{schema}\n\nReturn JSON with keys queries, joins, checks.",
        k = k,
        question = question.unwrap_or("None"),
        sql = sql.unwrap_or("None"),
        rows = sample_rows_json.unwrap_or("None"),
        schema = schema_json(schema_subset)
    )
}
