use crate::config::Settings;
use crate::search::{Findings, SearchHit, SearchProvider};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_MAX_RESULTS: u32 = 8;

#[derive(Debug, Clone)]
pub struct TavilyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: u32,
    include_domains: Vec<String>,
}

impl TavilyClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_tavily_api_key()?.to_string();
        let base_url =
            std::env::var("TAVILY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("TAVILY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let max_results = std::env::var("TAVILY_MAX_RESULTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_RESULTS);

        // Comma-separated allow-list, e.g. "reuters.com,bloomberg.com".
        let include_domains = std::env::var("TAVILY_INCLUDE_DOMAINS")
            .map(|s| parse_domains(&s))
            .unwrap_or_default();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build Tavily http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            max_results,
            include_domains,
        })
    }

    fn request_body<'a>(&'a self, query: &'a str) -> SearchRequest<'a> {
        SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            include_answer: true,
            max_results: self.max_results,
            include_images: false,
            include_domains: (!self.include_domains.is_empty()).then_some(&self.include_domains),
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for TavilyClient {
    fn provider_name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Findings> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .json(&self.request_body(query))
            .send()
            .await
            .context("Tavily request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Tavily response")?;
        if !status.is_success() {
            anyhow::bail!("Tavily HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<SearchResponse>(&text)
            .with_context(|| format!("Tavily response is not valid search JSON: {text}"))?;

        let findings = parsed.into_findings(query);
        tracing::debug!(hits = findings.hits.len(), has_answer = findings.answer.is_some(), "tavily search done");
        Ok(findings)
    }
}

fn parse_domains(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    max_results: u32,
    include_images: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

impl SearchResponse {
    fn into_findings(self, query: &str) -> Findings {
        Findings {
            query: query.to_string(),
            answer: self.answer.filter(|a| !a.trim().is_empty()),
            hits: self
                .results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.url,
                    snippet: r.content,
                    relevance: r.score,
                })
                .collect(),
        }
    }
}
