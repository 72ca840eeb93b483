use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Provider failure with enough of the raw exchange attached to debug it from
/// logs. Callers can `downcast_ref` this out of an `anyhow::Error`.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    /// Non-2xx response from the provider API.
    pub fn http(provider: Provider, status: reqwest::StatusCode, body: String) -> Self {
        let raw_response_json = serde_json::from_str::<Value>(&body).ok();
        let message = raw_response_json
            .as_ref()
            .and_then(|v| v.pointer("/error/message"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            provider,
            stage: "http",
            detail: match message {
                Some(m) => format!("status={status}: {m}"),
                None => format!("status={status}"),
            },
            raw_output: Some(body),
            raw_response_json,
        }
    }

    /// 2xx response that carried no usable text.
    pub fn empty_output(provider: Provider, raw_response_json: Value) -> Self {
        Self {
            provider,
            stage: "empty_output",
            detail: "response contained no text content".to_string(),
            raw_output: None,
            raw_response_json: Some(raw_response_json),
        }
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_surfaces_provider_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let err = LlmDiagnosticsError::http(
            Provider::OpenAI,
            reqwest::StatusCode::UNAUTHORIZED,
            body.to_string(),
        );
        assert_eq!(err.stage, "http");
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Incorrect API key provided"));
        assert!(err.raw_response_json.is_some());
    }

    #[test]
    fn http_error_keeps_non_json_body() {
        let err = LlmDiagnosticsError::http(
            Provider::Anthropic,
            reqwest::StatusCode::BAD_GATEWAY,
            "upstream connect error".to_string(),
        );
        assert_eq!(err.raw_output.as_deref(), Some("upstream connect error"));
        assert!(err.raw_response_json.is_none());
    }
}
