use anyhow::Result;
use clap::Parser;
use sqlassist::data_assistant::{DataAssistant, Text2SqlRequest, UploadSchemaRequest};
use sqlassist::dialect::SqlDialect;
use sqlassist::llm::OpenRouterClient;
use sqlassist::schema_cache::SchemaCache;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sqlassist")]
#[command(about = "Natural-language-to-SQL assistant over an uploaded DDL schema")]
struct Args {
    /// The question to answer with a SQL query
    question: String,

    /// Path to a file of CREATE TABLE statements
    #[arg(short, long, default_value = "schema.sql")]
    schema: PathBuf,

    /// SQL dialect used for parsing and validation
    #[arg(short, long, default_value = "mysql")]
    dialect: SqlDialect,

    /// Row cap injected into generated SELECT queries
    #[arg(long, default_value_t = 100)]
    max_rows: usize,

    /// Extra constraints passed to the generator
    #[arg(long)]
    constraints: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let ddl = std::fs::read_to_string(&args.schema)?;

    let cache = Arc::new(SchemaCache::new());
    let generator = Arc::new(OpenRouterClient::from_env());
    let assistant = DataAssistant::new(generator, cache);

    let upload = assistant.upload_schema(UploadSchemaRequest {
        db_key: "default".to_string(),
        schema_sql: Some(ddl),
        schema_json: None,
        database_type: args.dialect,
    })?;
    info!(tables = upload.tables, "schema loaded");
    for warning in &upload.warnings {
        warn!("schema warning: {}", warning);
    }

    let response = assistant
        .generate_sql(Text2SqlRequest {
            db_key: "default".to_string(),
            question: args.question,
            constraints: args.constraints,
            max_rows: args.max_rows,
        })
        .await?;

    println!("{}", response.sql);
    if let Some(notes) = response.notes {
        info!("{}", notes);
    }

    Ok(())
}
