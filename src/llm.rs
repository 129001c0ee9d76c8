//! Text generation client (OpenRouter chat completions).
//!
//! The assistant talks to the generator through the [`TextGenerator`]
//! trait so orchestration code and tests never depend on the transport.
//! Whatever comes back is untrusted and must go through the sanitizer.

use crate::error::{AssistError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";

/// Upper bound on a single upstream call so one slow request cannot
/// stall a worker indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send a system + user prompt pair, receive the raw completion text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

pub struct OpenRouterClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from `OPENROUTER_API_KEY` / `OPENROUTER_MODEL` /
    /// `OPENROUTER_BASE_URL`. A missing key is reported at call time so
    /// the surrounding process can still start.
    pub fn from_env() -> Self {
        let api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        let model =
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(api_key, model, base_url)
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AssistError::Generation(
                "missing OPENROUTER_API_KEY".to_string(),
            ));
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.1,
        });

        debug!(model = %self.model, "sending completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "http://localhost")
            .header("X-Title", "sqlassist")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AssistError::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistError::Generation(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AssistError::Generation(format!(
                "upstream returned {}: {}",
                status, body
            )));
        }

        let data: serde_json::Value = serde_json::from_str(&body)?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.to_string())
            .ok_or_else(|| {
                AssistError::Generation("no content in completion response".to_string())
            })
    }
}
