//! Language-model passes over an intake: refinement and narrative summary.

pub mod refine;
pub mod summarize;

use crate::domain::intake::Intake;
use crate::llm::LlmClient;
use crate::search::Findings;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait IntakeRefiner: Send + Sync {
    /// Returns a normalized copy of `intake`; the input is never modified.
    async fn refine(&self, intake: &Intake) -> anyhow::Result<Intake>;
}

#[async_trait::async_trait]
pub trait FindingsSummarizer: Send + Sync {
    /// Produces the Markdown narrative for the report.
    async fn summarize(&self, findings: &Findings, intake: &Intake) -> anyhow::Result<String>;
}

/// Both passes backed by one language-model client.
#[derive(Clone)]
pub struct LlmAnalyst {
    llm: Arc<dyn LlmClient>,
    /// Fail instead of degrading to an empty intake when refinement output
    /// cannot be parsed.
    strict_refinement: bool,
    language: String,
}

impl LlmAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, strict_refinement: bool, language: impl Into<String>) -> Self {
        Self {
            llm,
            strict_refinement,
            language: language.into(),
        }
    }
}
