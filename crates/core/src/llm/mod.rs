pub mod anthropic;
pub mod error;
pub mod json;
pub mod openai;

use crate::config::Settings;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// The caller expects a single JSON object back.
    JsonObject,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub format: ResponseFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" | "gpt" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// One-shot completion; returns the model's text output.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String>;
}

/// Builds the client selected by `LLM_PROVIDER` (OpenAI when unset).
pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn LlmClient>> {
    match settings.llm_provider()? {
        Provider::OpenAI => Ok(Arc::new(openai::OpenAiClient::from_settings(settings)?)),
        Provider::Anthropic => Ok(Arc::new(anthropic::AnthropicClient::from_settings(
            settings,
        )?)),
    }
}
