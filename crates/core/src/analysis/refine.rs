use crate::analysis::{IntakeRefiner, LlmAnalyst};
use crate::domain::intake::Intake;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{CompletionRequest, ResponseFormat};
use anyhow::Context;

const REFINE_TEMPERATURE: f32 = 0.2;

fn system_prompt() -> String {
    [
        "You are a financial analyst assistant. Normalize and sanity-check user intake JSON.",
        "Return compact JSON with missing fields removed, numbers parsed to numeric when obvious (e.g., \"15\" -> 15).",
        "Keep tickers/symbols uppercased.",
        "Keep the original key names: assets, profile, crypto, equity, realestate, fixed, cash.",
    ]
    .join("\n")
}

fn user_prompt(intake_json: &str) -> String {
    format!("Raw intake JSON:\n{intake_json}")
}

impl LlmAnalyst {
    /// Turns refinement output into an intake, or `None` when it is not a
    /// JSON object at all.
    fn parse_refined(text: &str) -> Option<Intake> {
        json::parse_object(text).map(Intake::from_refined)
    }
}

#[async_trait::async_trait]
impl IntakeRefiner for LlmAnalyst {
    async fn refine(&self, intake: &Intake) -> anyhow::Result<Intake> {
        let intake_json =
            serde_json::to_string(intake).context("failed to serialize intake for refinement")?;

        let reply = self
            .llm
            .complete(CompletionRequest {
                system: system_prompt(),
                user: user_prompt(&intake_json),
                temperature: REFINE_TEMPERATURE,
                format: ResponseFormat::JsonObject,
            })
            .await;

        // A reply with no content is treated like unparsable output.
        let text = match reply {
            Ok(text) => text,
            Err(e) if is_empty_output(&e) => String::new(),
            Err(e) => return Err(e),
        };

        match Self::parse_refined(&text) {
            Some(refined) => Ok(refined),
            None if self.strict_refinement => {
                anyhow::bail!("refinement output is not a valid intake object: {text}")
            }
            None => {
                tracing::warn!(
                    provider = ?self.llm.provider(),
                    output_len = text.len(),
                    "refinement output unparsable; continuing with an empty intake"
                );
                Ok(Intake::default())
            }
        }
    }
}

fn is_empty_output(err: &anyhow::Error) -> bool {
    err.downcast_ref::<LlmDiagnosticsError>()
        .is_some_and(|diag| diag.stage == "empty_output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intake::{amount, RiskLevel};
    use crate::llm::{LlmClient, Provider};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct CannedLlm {
        /// `None` answers like a provider whose reply had no content.
        output: Option<String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedLlm {
        fn new(output: &str) -> Arc<Self> {
            Arc::new(Self {
                output: Some(output.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn empty() -> Arc<Self> {
            Arc::new(Self {
                output: None,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for CannedLlm {
        fn provider(&self) -> Provider {
            Provider::OpenAI
        }

        async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(req);
            match &self.output {
                Some(text) => Ok(text.clone()),
                None => Err(LlmDiagnosticsError::empty_output(
                    Provider::OpenAI,
                    json!({"choices": [{"message": {"content": null}}]}),
                )
                .into()),
            }
        }
    }

    fn raw_intake() -> Intake {
        serde_json::from_value(json!({
            "assets": ["equity"],
            "profile": {"risk": "high", "horizon": "long", "goal": "growth", "lossLimit": 10, "volPref": 80},
            "equity": [{"ticker": "aapl", "qty": "10", "avgCost": "180"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn returns_refined_intake() {
        let llm = CannedLlm::new(
            r#"{"assets":["equity"],"profile":{"risk":"high"},"equity":[{"ticker":"AAPL","qty":10,"avgCost":180}]}"#,
        );
        let analyst = LlmAnalyst::new(llm.clone(), false, "Korean");

        let refined = analyst.refine(&raw_intake()).await.unwrap();
        assert_eq!(refined.equity[0].ticker, "AAPL");
        assert_eq!(amount(&refined.equity[0].qty), 10.0);
        assert_eq!(refined.profile.risk, Some(RiskLevel::High));

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].format, ResponseFormat::JsonObject);
        assert!(seen[0].user.starts_with("Raw intake JSON:\n{"));
        assert!(seen[0].user.contains("\"ticker\":\"aapl\""));
    }

    #[tokio::test]
    async fn unparsable_output_degrades_to_empty_intake() {
        let analyst = LlmAnalyst::new(CannedLlm::new("Sorry, I cannot help with that."), false, "Korean");
        let refined = analyst.refine(&raw_intake()).await.unwrap();
        assert_eq!(refined, Intake::default());
    }

    #[tokio::test]
    async fn wrong_shaped_section_is_dropped_alone() {
        let analyst = LlmAnalyst::new(
            CannedLlm::new(r#"{"crypto": "none", "equity": [{"ticker": "AAPL", "qty": 3}]}"#),
            false,
            "Korean",
        );
        let refined = analyst.refine(&raw_intake()).await.unwrap();
        assert!(refined.crypto.is_empty());
        assert_eq!(refined.equity.len(), 1);
        assert_eq!(amount(&refined.equity[0].qty), 3.0);
    }

    #[tokio::test]
    async fn keeps_holdings_when_descriptive_fields_come_back_as_numbers() {
        let llm = CannedLlm::new(
            r#"{"assets":["equity","fixed"],
                "profile":{"risk":"high","horizon":"long","goal":"growth","lossLimit":10,"volPref":80},
                "equity":[{"ticker":"AAPL","qty":10,"avgCost":180}],
                "fixed":[{"name":"KTB","coupon":3.5,"maturity":2030,"duration":5}],
                "cash":{"amount":5000}}"#,
        );
        let analyst = LlmAnalyst::new(llm, false, "Korean");

        let refined = analyst.refine(&raw_intake()).await.unwrap();
        assert_eq!(refined.equity.len(), 1);
        assert_eq!(refined.fixed.len(), 1);
        assert_eq!(refined.fixed[0].maturity.as_deref(), Some("2030"));
        assert_eq!(amount(&refined.cash.amount), 5000.0);
        assert_eq!(refined.profile.loss_limit(), 10.0);
    }

    #[tokio::test]
    async fn empty_reply_degrades_to_empty_intake() {
        let analyst = LlmAnalyst::new(CannedLlm::empty(), false, "Korean");
        let refined = analyst.refine(&raw_intake()).await.unwrap();
        assert_eq!(refined, Intake::default());
    }

    #[tokio::test]
    async fn strict_mode_fails_on_empty_reply() {
        let analyst = LlmAnalyst::new(CannedLlm::empty(), true, "Korean");
        let err = analyst.refine(&raw_intake()).await.unwrap_err();
        assert!(err.to_string().contains("not a valid intake object"));
    }

    #[tokio::test]
    async fn strict_mode_fails_on_unparsable_output() {
        let analyst = LlmAnalyst::new(CannedLlm::new("[]"), true, "Korean");
        let err = analyst.refine(&raw_intake()).await.unwrap_err();
        assert!(err.to_string().contains("not a valid intake object"));
    }
}
