use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::conversation::Message;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "qwen/qwen3-vl-235b-a22b-instruct";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Turns a conversation into the model's next reply. No output format is
/// enforced here; the agent loop copes with whatever text comes back.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, conversation: &[Message]) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    /// Defaults with the key taken from `OPENROUTER_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow!("{} not set in environment", API_KEY_ENV))?;
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    client: Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LlmClient for ChatClient {
    async fn complete(&self, conversation: &[Message]) -> Result<String> {
        if conversation.len() > 40 {
            warn!(
                messages = conversation.len(),
                "Conversation history is long"
            );
        }

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": conversation,
            }))
            .send()
            .await?;

        let status = response.status();
        let json_resp: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let err_msg = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            error!("LLM API error ({}): {}", status, err_msg);
            return Err(anyhow!("LLM API error ({}): {}", status, err_msg));
        }

        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("No content in LLM response: {}", json_resp))?;

        debug!("LLM says: {}", content);
        Ok(content.to_string())
    }
}
