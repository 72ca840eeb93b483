use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{CompletionRequest, LlmClient, Provider, ResponseFormat};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// The Messages API has no JSON mode, so JSON requests get this appended to
/// the system prompt.
const JSON_ONLY_SUFFIX: &str = "\n\nRespond with exactly one JSON object and nothing else: \
no Markdown fences, no commentary, double-quoted keys and strings.";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(env_or(
                "ANTHROPIC_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )))
            .build()
            .context("failed to build Anthropic http client")?;

        Ok(Self {
            http,
            api_key,
            base_url: env_or("ANTHROPIC_BASE_URL", DEFAULT_BASE_URL.to_string()),
            model: env_or("ANTHROPIC_MODEL", DEFAULT_MODEL.to_string()),
            max_tokens: env_or("ANTHROPIC_MAX_TOKENS", DEFAULT_MAX_TOKENS),
        })
    }

    fn message_body<'a>(&'a self, req: &'a CompletionRequest) -> MessagesBody<'a> {
        let system = match req.format {
            ResponseFormat::JsonObject => format!("{}{JSON_ONLY_SUFFIX}", req.system),
            ResponseFormat::Text => req.system.clone(),
        };
        MessagesBody {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            temperature: req.temperature,
            messages: [UserTurn {
                role: "user",
                content: &req.user,
            }],
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.message_body(&req))
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            return Err(LlmDiagnosticsError::http(Provider::Anthropic, status, body).into());
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .with_context(|| format!("Anthropic returned non-JSON body: {body}"))?;
        let reply: MessagesReply =
            serde_json::from_value(raw.clone()).context("unexpected Anthropic response shape")?;

        if reply.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(
                model = %self.model,
                max_tokens = self.max_tokens,
                "Anthropic reply cut at max_tokens"
            );
        }

        let text = reply.text();
        if text.trim().is_empty() {
            return Err(LlmDiagnosticsError::empty_output(Provider::Anthropic, raw).into());
        }

        Ok(match req.format {
            ResponseFormat::JsonObject => json::extract_json(&text).unwrap_or(text),
            ResponseFormat::Text => text,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    temperature: f32,
    messages: [UserTurn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<ReplyBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

impl MessagesReply {
    /// Text blocks joined by newlines; thinking and tool blocks are dropped.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ReplyBlock::Text { text } => Some(text.as_str()),
                ReplyBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplyBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AnthropicClient {
        AnthropicClient {
            http: reqwest::Client::new(),
            api_key: "test".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[test]
    fn json_requests_carry_json_only_instruction() {
        let req = CompletionRequest {
            system: "Normalize intake.".to_string(),
            user: "{}".to_string(),
            temperature: 0.2,
            format: ResponseFormat::JsonObject,
        };
        let c = client();
        let body = serde_json::to_value(c.message_body(&req)).unwrap();
        let system = body["system"].as_str().unwrap();
        assert!(system.starts_with("Normalize intake."));
        assert!(system.contains("exactly one JSON object"));
        assert_eq!(body["messages"], json!([{"role": "user", "content": "{}"}]));
        assert_eq!(body["model"], DEFAULT_MODEL);
    }

    #[test]
    fn text_requests_keep_system_prompt() {
        let req = CompletionRequest {
            system: "Write a brief.".to_string(),
            user: "data".to_string(),
            temperature: 0.3,
            format: ResponseFormat::Text,
        };
        let c = client();
        let body = serde_json::to_value(c.message_body(&req)).unwrap();
        assert_eq!(body["system"], "Write a brief.");
    }

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let reply: MessagesReply = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "sig"},
                {"type": "text", "text": "## Summary"},
                {"type": "server_tool_use", "id": "x"},
                {"type": "text", "text": "Markets were mixed."}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();

        assert_eq!(reply.text(), "## Summary\nMarkets were mixed.");
    }
}
