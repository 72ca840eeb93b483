pub mod tavily;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

/// Web-search results used as narrative context, in provider rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub hits: Vec<SearchHit>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn search(&self, query: &str) -> anyhow::Result<Findings>;
}
