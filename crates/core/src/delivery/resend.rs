use crate::config::Settings;
use crate::delivery::{DeliveryReceipt, Mailer, OutgoingEmail};
use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.resend.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ResendMailer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_resend_api_key()?.to_string();
        let base_url =
            std::env::var("RESEND_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build Resend http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            from: settings.email_from.clone(),
        })
    }

    fn request_body<'a>(&'a self, email: &'a OutgoingEmail) -> SendEmailRequest<'a> {
        SendEmailRequest {
            from: &self.from,
            to: vec![email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            attachments: email.attachment.as_ref().map(|a| {
                vec![AttachmentBody {
                    filename: &a.filename,
                    content: base64::engine::general_purpose::STANDARD.encode(&a.content),
                }]
            }),
        }
    }
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt> {
        let url = format!("{}/emails", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(email))
            .send()
            .await
            .context("Resend request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Resend response")?;
        let receipt = parse_send_response(status, &text)?;

        tracing::info!(email_id = %receipt.id, attachment = email.attachment.is_some(), "email sent");
        Ok(receipt)
    }
}

fn parse_send_response(status: reqwest::StatusCode, text: &str) -> Result<DeliveryReceipt> {
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(text)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| text.to_string());
        tracing::error!(%status, %message, "email send failed");
        anyhow::bail!("Resend send failed (HTTP {status}): {message}");
    }

    let parsed = serde_json::from_str::<SendEmailResponse>(text)
        .with_context(|| format!("Resend response is missing an id: {text}"))?;
    anyhow::ensure!(!parsed.id.trim().is_empty(), "Resend returned an empty id");
    Ok(DeliveryReceipt { id: parsed.id })
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<AttachmentBody<'a>>>,
}

#[derive(Debug, Serialize)]
struct AttachmentBody<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::Attachment;
    use serde_json::json;

    fn mailer() -> ResendMailer {
        ResendMailer {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: "re_test".to_string(),
            from: "noreply@sierra.ai".to_string(),
        }
    }

    #[test]
    fn encodes_attachment_as_base64() {
        let email = OutgoingEmail {
            to: "user@example.com".to_string(),
            subject: "Your report".to_string(),
            html: "<p>Attached.</p>".to_string(),
            attachment: Some(Attachment {
                filename: "report.pdf".to_string(),
                content: b"%PDF-1.7".to_vec(),
            }),
        };

        let m = mailer();
        let body = serde_json::to_value(m.request_body(&email)).unwrap();
        assert_eq!(
            body,
            json!({
                "from": "noreply@sierra.ai",
                "to": ["user@example.com"],
                "subject": "Your report",
                "html": "<p>Attached.</p>",
                "attachments": [{"filename": "report.pdf", "content": "JVBERi0xLjc="}]
            })
        );
    }

    #[test]
    fn omits_attachments_when_absent() {
        let email = OutgoingEmail {
            to: "user@example.com".to_string(),
            subject: "Hi".to_string(),
            html: "<p>Hi</p>".to_string(),
            attachment: None,
        };
        let m = mailer();
        let body = serde_json::to_value(m.request_body(&email)).unwrap();
        assert!(body.get("attachments").is_none());
    }

    #[test]
    fn parses_success_and_error_responses() {
        let ok = parse_send_response(reqwest::StatusCode::OK, r#"{"id":"49a3999c-0ce1"}"#).unwrap();
        assert_eq!(ok.id, "49a3999c-0ce1");

        let err = parse_send_response(
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"statusCode":422,"name":"validation_error","message":"Invalid `to` field."}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid `to` field."));

        assert!(parse_send_response(reqwest::StatusCode::OK, "{}").is_err());
    }
}
