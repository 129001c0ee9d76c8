use async_trait::async_trait;
use sqlassist::data_assistant::{
    DataAssistant, FixSqlRequest, SuggestJoinsRequest, SuggestNextRequest, Text2SqlRequest,
    UploadSchemaRequest,
};
use sqlassist::dialect::SqlDialect;
use sqlassist::error::{AssistError, Result};
use sqlassist::join_graph::{build_fk_edges, find_join_paths};
use sqlassist::llm::TextGenerator;
use sqlassist::schema_cache::SchemaCache;
use sqlassist::schema_extractor::extract_schema;
use std::sync::{Arc, Mutex};

const DDL: &str = r#"
-- Web-shop schema dump
CREATE TABLE customers (
  id INT NOT NULL,
  name VARCHAR(100),
  email VARCHAR(255),
  PRIMARY KEY (id)
);

CREATE TABLE orders (
  id INT NOT NULL,
  customer_id INT,
  total_amount DECIMAL(10,2),
  PRIMARY KEY (id),
  KEY `idx_orders_customer` (`customer_id`),
  CONSTRAINT `fk_orders_customer` FOREIGN KEY (`customer_id`) REFERENCES `customers` (`id`)
);

CREATE TABLE order_items (
  id INT NOT NULL,
  order_id INT,
  product_id INT,
  quantity INT,
  PRIMARY KEY (id),
  CONSTRAINT `fk_items_order` FOREIGN KEY (`order_id`) REFERENCES `orders` (`id`),
  CONSTRAINT `fk_items_product` FOREIGN KEY (`product_id`) REFERENCES `products` (`id`)
);

CREATE TABLE products (
  id INT NOT NULL,
  label VARCHAR(100),
  unit_price DECIMAL(10,2),
  PRIMARY KEY (id)
);
"#;

/// Replays canned generator outputs in order; repeats the last one when
/// the script runs out.
struct ScriptedGenerator {
    replies: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            Ok(replies.remove(0))
        } else {
            Ok(replies.first().cloned().unwrap_or_default())
        }
    }
}

fn assistant_with(replies: &[&str]) -> DataAssistant {
    DataAssistant::new(ScriptedGenerator::new(replies), Arc::new(SchemaCache::new()))
}

fn upload(assistant: &DataAssistant) {
    let response = assistant
        .upload_schema(UploadSchemaRequest {
            db_key: "default".to_string(),
            schema_sql: Some(DDL.to_string()),
            schema_json: None,
            database_type: SqlDialect::MySql,
        })
        .unwrap();
    assert_eq!(response.tables, 4);
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn test_generate_sql_end_to_end() {
    let assistant = assistant_with(&["```sql\nSELECT id, total_amount FROM orders;\n```"]);
    upload(&assistant);

    let response = assistant
        .generate_sql(Text2SqlRequest {
            db_key: "default".to_string(),
            question: "total amount per order".to_string(),
            constraints: None,
            max_rows: 100,
        })
        .await
        .unwrap();

    assert_eq!(response.sql, "SELECT id, total_amount FROM orders LIMIT 100");
}

#[tokio::test]
async fn test_generate_sql_respects_existing_limit() {
    let assistant = assistant_with(&["SELECT id FROM orders LIMIT 10"]);
    upload(&assistant);

    let response = assistant
        .generate_sql(Text2SqlRequest {
            db_key: "default".to_string(),
            question: "first ten orders".to_string(),
            constraints: None,
            max_rows: 100,
        })
        .await
        .unwrap();

    assert_eq!(response.sql, "SELECT id FROM orders LIMIT 10");
}

#[tokio::test]
async fn test_generate_sql_blocks_destructive_output() {
    let assistant = assistant_with(&["DELETE FROM orders"]);
    upload(&assistant);

    let err = assistant
        .generate_sql(Text2SqlRequest {
            db_key: "default".to_string(),
            question: "remove all orders".to_string(),
            constraints: None,
            max_rows: 100,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AssistError::UnsafeSql(keyword) if keyword == "DELETE"));
}

#[tokio::test]
async fn test_generate_sql_rejects_multiple_statements() {
    let assistant = assistant_with(&["SELECT 1; SELECT 2"]);
    upload(&assistant);

    let err = assistant
        .generate_sql(Text2SqlRequest {
            db_key: "default".to_string(),
            question: "two things at once".to_string(),
            constraints: None,
            max_rows: 100,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AssistError::MultiStatement(2)));
}

#[tokio::test]
async fn test_generate_sql_without_schema_is_not_found() {
    let assistant = assistant_with(&["SELECT 1"]);

    let err = assistant
        .generate_sql(Text2SqlRequest {
            db_key: "missing".to_string(),
            question: "anything".to_string(),
            constraints: None,
            max_rows: 100,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AssistError::SchemaNotFound(_)));
}

#[tokio::test]
async fn test_fix_sql_patches_unknown_column_deterministically() {
    // The generator echoes a corrected statement; the deterministic
    // patch must already have replaced the typo in the prompt input.
    let assistant = assistant_with(&["SELECT total_amount FROM orders"]);
    upload(&assistant);

    let response = assistant
        .fix_sql(FixSqlRequest {
            db_key: "default".to_string(),
            sql: "SELECT totl_amount FROM orders".to_string(),
            error: Some("Unknown column 'totl_amount' in 'field list'".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(response.sql, "SELECT total_amount FROM orders LIMIT 100");
}

#[tokio::test]
async fn test_fix_sql_retries_once_on_empty_output() {
    let assistant = assistant_with(&["", "SELECT id FROM customers"]);
    upload(&assistant);

    let response = assistant
        .fix_sql(FixSqlRequest {
            db_key: "default".to_string(),
            sql: "SELECT id FROM customers WHERE".to_string(),
            error: None,
        })
        .await
        .unwrap();

    assert_eq!(response.sql, "SELECT id FROM customers LIMIT 100");
}

#[tokio::test]
async fn test_suggest_joins_path_mode() {
    let assistant = assistant_with(&[""]);
    upload(&assistant);

    let response = assistant
        .suggest_joins(SuggestJoinsRequest {
            db_key: "default".to_string(),
            tables: None,
            from_table: Some("customers".to_string()),
            to_table: Some("products".to_string()),
            max_suggestions: 10,
        })
        .unwrap();

    assert_eq!(response.joins.len(), 1);
    assert!(response.joins[0].starts_with("`customers` a JOIN `orders` b"));
    assert!(response.joins[0].contains("JOIN `products` d"));
    assert_eq!(response.graph_edges.len(), 3);
}

#[tokio::test]
async fn test_suggest_joins_unknown_table() {
    let assistant = assistant_with(&[""]);
    upload(&assistant);

    let err = assistant
        .suggest_joins(SuggestJoinsRequest {
            db_key: "default".to_string(),
            tables: None,
            from_table: Some("warehouse".to_string()),
            to_table: Some("orders".to_string()),
            max_suggestions: 10,
        })
        .unwrap_err();

    assert!(matches!(err, AssistError::UnknownTable(name) if name == "warehouse"));
}

#[tokio::test]
async fn test_suggest_joins_pairwise_mode_dedups() {
    let assistant = assistant_with(&[""]);
    upload(&assistant);

    let response = assistant
        .suggest_joins(SuggestJoinsRequest {
            db_key: "default".to_string(),
            tables: Some(vec!["ORDERS".to_string(), "Customers".to_string()]),
            from_table: None,
            to_table: None,
            max_suggestions: 10,
        })
        .unwrap();

    assert_eq!(response.joins.len(), 1);
    assert_eq!(
        response.joins[0],
        "`orders` a JOIN `customers` b ON a.`customer_id` = b.`id`"
    );
}

#[tokio::test]
async fn test_suggest_next_parses_fenced_json() {
    let assistant = assistant_with(&[concat!(
        "```json\n",
        r#"{"queries": [{"sql": "SELECT id FROM orders", "title": "Recent orders"}, "SELECT label FROM products"],"#,
        r#" "joins": ["orders -> customers"], "checks": ["orders.customer_id not null"]}"#,
        "\n```"
    )]);
    upload(&assistant);

    let response = assistant
        .suggest_next(SuggestNextRequest {
            db_key: "default".to_string(),
            question: Some("what next".to_string()),
            sql: None,
            sample_rows_json: None,
            max_suggestions: 8,
        })
        .await
        .unwrap();

    assert_eq!(response.queries.len(), 2);
    assert_eq!(response.queries[0].title, "Recent orders");
    assert_eq!(response.queries[1].sql, "SELECT label FROM products");
    assert_eq!(response.joins.len(), 1);
    assert_eq!(response.checks.len(), 1);
}

#[test]
fn test_schema_pipeline_edges_and_paths() {
    let schema = extract_schema(DDL, SqlDialect::MySql).unwrap();
    assert_eq!(schema.tables.len(), 4);

    let edges = build_fk_edges(&schema);
    assert_eq!(edges.len(), 3);

    let paths = find_join_paths(&schema, "customers", "products", 4).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].len(), 3);
}
