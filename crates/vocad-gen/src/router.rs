use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::GenError;

const DEFAULT_BASE_URL: &str = "https://api.dedaluslabs.ai";

/// Ranked model candidates per call site, mirroring what the frontend was
/// tuned against.
pub const GENERATE_MODELS: &[&str] = &["openai/gpt-5-mini"];
pub const ITERATE_MODELS: &[&str] = &["openai/gpt-5-mini", "claude-sonnet-4-20250514"];
pub const NARRATION_MODELS: &[&str] = &["openai/gpt-5", "gemini-2.5-flash"];
pub const SUMMARY_MODELS: &[&str] = &["openai/gpt-4o-mini", "gemini-2.5-flash"];

/// External search capability handed to the router.
pub const SEARCH_SERVERS: &[&str] = &["windsor/brave-search-mcp"];
pub const ITERATE_SERVERS: &[&str] = &["windsor/brave-search-mcp", "akakak/sonar", "windsor/context7"];

/// Seam over the routed text-generation service so the orchestrator can be
/// exercised without the network.
#[async_trait]
pub trait TextRouter: Send + Sync {
    async fn run(&self, input: &str, models: &[&str], mcp_servers: &[&str])
    -> Result<String, GenError>;
}

/// Production client for the model-routing service.
pub struct RouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RouterResponse {
    #[serde(default)]
    final_output: Option<String>,
}

impl RouterClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_env() -> Option<Self> {
        match std::env::var("DEDALUS_API_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key)),
            _ => {
                warn!("DEDALUS_API_KEY not set; generation endpoints will fall back");
                None
            }
        }
    }
}

#[async_trait]
impl TextRouter for RouterClient {
    async fn run(
        &self,
        input: &str,
        models: &[&str],
        mcp_servers: &[&str],
    ) -> Result<String, GenError> {
        let resp = self
            .http
            .post(format!("{}/v1/chat", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "input": input,
                "model": models,
                "mcp_servers": mcp_servers,
                "stream": false,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenError::Upstream(format!(
                "router returned {}: {}",
                status, body
            )));
        }

        let parsed: RouterResponse = resp.json().await?;
        parsed
            .final_output
            .filter(|out| !out.is_empty())
            .ok_or_else(|| GenError::Upstream("router returned no output".into()))
    }
}
