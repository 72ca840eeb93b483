use serde::Serialize;
use std::fmt;

/// Workflow stage that can fail, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Refinement,
    Search,
    Summarization,
    Render,
    Delivery,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Refinement => "refinement",
            Stage::Search => "search",
            Stage::Summarization => "summarization",
            Stage::Render => "render",
            Stage::Delivery => "delivery",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ReportError {
    pub stage: Stage,
    pub source: anyhow::Error,
}

impl ReportError {
    pub fn new(stage: Stage, source: anyhow::Error) -> Self {
        Self { stage, source }
    }

    /// True when an external provider failed, as opposed to local rendering.
    pub fn is_upstream(&self) -> bool {
        self.stage != Stage::Render
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {:#}", self.stage, self.source)
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn display_names_stage_and_full_chain() {
        let source = Err::<(), _>(anyhow::anyhow!("HTTP 429"))
            .context("Tavily request failed")
            .unwrap_err();
        let err = ReportError::new(Stage::Search, source);
        assert_eq!(err.to_string(), "search stage failed: Tavily request failed: HTTP 429");
        assert!(err.is_upstream());
        assert!(!ReportError::new(Stage::Render, anyhow::anyhow!("x")).is_upstream());
    }

    #[test]
    fn stage_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Stage::Summarization).unwrap(), "summarization");
    }
}
