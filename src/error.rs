use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Schema parse error: {0}")]
    SchemaParse(String),

    #[error("Schema not found for db_key '{0}'. Upload a schema first.")]
    SchemaNotFound(String),

    #[error("Table not found in schema: {0}")]
    UnknownTable(String),

    #[error("Blocked: dangerous SQL keyword '{0}' detected")]
    UnsafeSql(String),

    #[error("Expected a single SQL statement, found {0}")]
    MultiStatement(usize),

    #[error("No SQL statement could be extracted")]
    EmptySql,

    #[error("SQL invalid for {dialect}: {message}")]
    DialectValidation { dialect: String, message: String },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AssistError>;
