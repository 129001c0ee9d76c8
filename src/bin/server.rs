//! HTTP server for the SQL assistant.
//! Hand-rolled HTTP handling over tokio; JSON in, JSON out.

use sqlassist::data_assistant::{
    DataAssistant, ExplainResponse, ExplainSqlRequest, FixSqlRequest, OptimizeSqlRequest,
    SqlResponse, SuggestJoinsRequest, SuggestJoinsResponse, SuggestNextRequest,
    SuggestNextResponse, Text2SqlRequest, UploadSchemaRequest, UploadSchemaResponse,
};
use sqlassist::error::AssistError;
use sqlassist::llm::OpenRouterClient;
use sqlassist::schema_cache::SchemaCache;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let bind = std::env::var("SQLASSIST_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    if std::env::var("OPENROUTER_API_KEY").is_ok() {
        info!("OpenRouter API key found - generation endpoints enabled");
    } else {
        warn!("OPENROUTER_API_KEY not set - generation endpoints will fail");
    }

    let cache = Arc::new(SchemaCache::new());
    let generator = Arc::new(OpenRouterClient::from_env());
    let assistant = Arc::new(DataAssistant::new(generator, cache));

    let listener = TcpListener::bind(&bind).await?;
    info!("listening on {}", bind);

    loop {
        let (stream, addr) = listener.accept().await?;
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, assistant).await {
                error!("connection from {} failed: {}", addr, e);
            }
        });
    }
}

struct HttpRequest {
    method: String,
    path: String,
    body: String,
}

async fn handle_connection(
    mut stream: TcpStream,
    assistant: Arc<DataAssistant>,
) -> std::io::Result<()> {
    let request = read_request(&mut stream).await?;
    info!("{} {}", request.method, request.path);
    let response = route(&request, &assistant).await;
    stream.write_all(response.as_bytes()).await
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<HttpRequest> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            break buf.len();
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end.min(buf.len())]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let raw_path = parts.next().unwrap_or("/");

    // Drop query parameters and trailing slashes.
    let mut path = raw_path.split('?').next().unwrap_or("/").to_string();
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length && buf.len() <= MAX_REQUEST_BYTES {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = if header_end < buf.len() {
        String::from_utf8_lossy(&buf[header_end..]).to_string()
    } else {
        String::new()
    };

    Ok(HttpRequest { method, path, body })
}

async fn route(request: &HttpRequest, assistant: &DataAssistant) -> String {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/api/health") => json_response(
            200,
            r#"{"status":"ok","service":"sqlassist"}"#.to_string(),
        ),
        ("OPTIONS", _) => json_response(200, String::new()),
        ("POST", "/upload-schema") => match parse_body::<UploadSchemaRequest>(&request.body) {
            Ok(req) => respond(assistant.upload_schema(req)),
            Err(e) => respond::<UploadSchemaResponse>(Err(e)),
        },
        ("POST", "/generate-sql") => match parse_body::<Text2SqlRequest>(&request.body) {
            Ok(req) => respond(assistant.generate_sql(req).await),
            Err(e) => respond::<SqlResponse>(Err(e)),
        },
        ("POST", "/fix-sql") => match parse_body::<FixSqlRequest>(&request.body) {
            Ok(req) => respond(assistant.fix_sql(req).await),
            Err(e) => respond::<SqlResponse>(Err(e)),
        },
        ("POST", "/explain-sql") => match parse_body::<ExplainSqlRequest>(&request.body) {
            Ok(req) => respond(assistant.explain_sql(req).await),
            Err(e) => respond::<ExplainResponse>(Err(e)),
        },
        ("POST", "/optimize-sql") => match parse_body::<OptimizeSqlRequest>(&request.body) {
            Ok(req) => respond(assistant.optimize_sql(req).await),
            Err(e) => respond::<SqlResponse>(Err(e)),
        },
        ("POST", "/suggest-next") => match parse_body::<SuggestNextRequest>(&request.body) {
            Ok(req) => respond(assistant.suggest_next(req).await),
            Err(e) => respond::<SuggestNextResponse>(Err(e)),
        },
        ("POST", "/suggest-joins") => match parse_body::<SuggestJoinsRequest>(&request.body) {
            Ok(req) => respond(assistant.suggest_joins(req)),
            Err(e) => respond::<SuggestJoinsResponse>(Err(e)),
        },
        _ => json_response(
            404,
            format!(
                r#"{{"error":"Endpoint not found: {} {}"}}"#,
                request.method, request.path
            ),
        ),
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> sqlassist::error::Result<T> {
    serde_json::from_str(body.trim()).map_err(AssistError::from)
}

fn respond<T: serde::Serialize>(result: sqlassist::error::Result<T>) -> String {
    match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(body) => json_response(200, body),
            Err(e) => {
                error!("response serialization failed: {}", e);
                json_response(500, r#"{"error":"response serialization failed"}"#.to_string())
            }
        },
        Err(e) => {
            let status = status_for(&e);
            let body = serde_json::json!({ "error": e.to_string() }).to_string();
            json_response(status, body)
        }
    }
}

fn status_for(error: &AssistError) -> u16 {
    match error {
        AssistError::SchemaNotFound(_) => 404,
        AssistError::Generation(_) => 502,
        AssistError::Io(_) => 500,
        _ => 400,
    }
}

fn json_response(status: u16, body: String) -> String {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        502 => "Bad Gateway",
        _ => "Internal Server Error",
    };
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
