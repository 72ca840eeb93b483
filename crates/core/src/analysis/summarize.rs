use crate::analysis::{FindingsSummarizer, LlmAnalyst};
use crate::domain::intake::Intake;
use crate::llm::{CompletionRequest, ResponseFormat};
use crate::search::Findings;
use anyhow::Context;

const SUMMARY_TEMPERATURE: f32 = 0.3;

fn system_prompt(language: &str) -> String {
    format!(
        "You combine finance web findings and user profile to produce a {language} investment brief. \
Output Markdown sections only."
    )
}

fn user_prompt(intake_json: &str, findings_json: &str) -> String {
    format!(
        "User profile JSON:\n{intake_json}\n\nWeb findings JSON:\n{findings_json}\n\n\
Make: Summary, Key Metrics, Risks, Suggested Actions."
    )
}

#[async_trait::async_trait]
impl FindingsSummarizer for LlmAnalyst {
    async fn summarize(&self, findings: &Findings, intake: &Intake) -> anyhow::Result<String> {
        let intake_json =
            serde_json::to_string(intake).context("failed to serialize intake for summary")?;
        let findings_json =
            serde_json::to_string(findings).context("failed to serialize findings for summary")?;

        let markdown = self
            .llm
            .complete(CompletionRequest {
                system: system_prompt(&self.language),
                user: user_prompt(&intake_json, &findings_json),
                temperature: SUMMARY_TEMPERATURE,
                format: ResponseFormat::Text,
            })
            .await?;

        let markdown = markdown.trim();
        anyhow::ensure!(!markdown.is_empty(), "language model returned an empty narrative");
        Ok(markdown.to_string())
    }
}
