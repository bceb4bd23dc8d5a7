use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::GenError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 20_000;
const API_VERSION: &str = "2023-06-01";

/// Seam over the code-generation model.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Execute a prepared instruction and return the raw model text
    /// (possibly still wrapped in a markdown fence).
    async fn generate(&self, prompt: &str) -> Result<String, GenError>;
}

pub struct CodeGenClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl CodeGenClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_env() -> Option<Self> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key)),
            _ => {
                warn!("ANTHROPIC_API_KEY not set; generation endpoints will return 501");
                None
            }
        }
    }
}

#[async_trait]
impl CodeGenerator for CodeGenClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenError> {
        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": MODEL,
                "max_tokens": MAX_TOKENS,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenError::Upstream(format!(
                "code model returned {}: {}",
                status, body
            )));
        }

        let parsed: MessagesResponse = resp.json().await?;
        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }
}
