pub mod analysis;
pub mod delivery;
pub mod domain;
pub mod llm;
pub mod metrics;
pub mod query;
pub mod render;
pub mod report;
pub mod search;

pub mod config {
    use crate::domain::locale::ReportLocale;
    use crate::llm::Provider;
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_EMAIL_FROM: &str = "noreply@sierra.ai";
    const DEFAULT_DASHBOARD_URL: &str = "https://example.com/dashboard";
    const DEFAULT_REPORT_LANGUAGE: &str = "Korean";
    const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;
    const DEFAULT_RENDER_READY_TIMEOUT_SECS: u64 = 15;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub llm_provider: Option<String>,
        pub openai_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub tavily_api_key: Option<String>,
        pub resend_api_key: Option<String>,
        pub email_from: String,
        pub dashboard_url: String,
        pub report_language: String,
        pub refine_strict: bool,
        pub chrome_path: Option<String>,
        /// How long the report page may take to signal its charts are drawn.
        pub render_ready_timeout: Duration,
        pub search_timeout: Duration,
        pub render_timeout: Duration,
        pub frontend_origin: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                llm_provider: None,
                openai_api_key: None,
                anthropic_api_key: None,
                tavily_api_key: None,
                resend_api_key: None,
                email_from: DEFAULT_EMAIL_FROM.to_string(),
                dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
                report_language: DEFAULT_REPORT_LANGUAGE.to_string(),
                refine_strict: false,
                chrome_path: None,
                render_ready_timeout: Duration::from_secs(DEFAULT_RENDER_READY_TIMEOUT_SECS),
                search_timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
                render_timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
                frontend_origin: None,
                sentry_dsn: None,
            }
        }
    }

    fn non_empty(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn secs(key: &str, default: u64) -> Duration {
        Duration::from_secs(
            non_empty(key)
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(default),
        )
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                llm_provider: non_empty("LLM_PROVIDER"),
                openai_api_key: non_empty("OPENAI_API_KEY"),
                anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
                tavily_api_key: non_empty("TAVILY_API_KEY"),
                resend_api_key: non_empty("RESEND_API_KEY"),
                email_from: non_empty("EMAIL_FROM").unwrap_or(defaults.email_from),
                dashboard_url: non_empty("DASHBOARD_URL").unwrap_or(defaults.dashboard_url),
                report_language: non_empty("REPORT_LANGUAGE").unwrap_or(defaults.report_language),
                refine_strict: non_empty("REFINE_STRICT")
                    .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
                chrome_path: non_empty("CHROME_PATH"),
                render_ready_timeout: secs(
                    "RENDER_READY_TIMEOUT_SECS",
                    DEFAULT_RENDER_READY_TIMEOUT_SECS,
                ),
                search_timeout: secs("SEARCH_TIMEOUT_SECS", DEFAULT_SEARCH_TIMEOUT_SECS),
                render_timeout: secs("RENDER_TIMEOUT_SECS", DEFAULT_RENDER_TIMEOUT_SECS),
                frontend_origin: non_empty("FRONTEND_ORIGIN"),
                sentry_dsn: non_empty("SENTRY_DSN"),
            })
        }

        pub fn llm_provider(&self) -> anyhow::Result<Provider> {
            match self.llm_provider.as_deref() {
                None => Ok(Provider::OpenAI),
                Some(name) => Provider::from_name(name)
                    .with_context(|| format!("unsupported LLM_PROVIDER: {name}")),
            }
        }

        pub fn report_locale(&self) -> ReportLocale {
            ReportLocale::from_language(&self.report_language)
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_tavily_api_key(&self) -> anyhow::Result<&str> {
            self.tavily_api_key
                .as_deref()
                .context("TAVILY_API_KEY is required")
        }

        pub fn require_resend_api_key(&self) -> anyhow::Result<&str> {
            self.resend_api_key
                .as_deref()
                .context("RESEND_API_KEY is required")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn provider_defaults_to_openai() {
            let settings = Settings::default();
            assert_eq!(settings.llm_provider().unwrap(), Provider::OpenAI);
        }

        #[test]
        fn rejects_unknown_provider() {
            let settings = Settings {
                llm_provider: Some("llama".to_string()),
                ..Settings::default()
            };
            assert!(settings.llm_provider().is_err());
        }

        #[test]
        fn defaults_to_korean_copy_and_fifteen_second_ready_wait() {
            let settings = Settings::default();
            assert_eq!(settings.report_locale(), ReportLocale::Korean);
            assert_eq!(settings.render_ready_timeout, Duration::from_secs(15));
            assert_eq!(settings.render_timeout, Duration::from_secs(60));
        }

        #[test]
        fn missing_keys_are_reported_by_name() {
            let err = Settings::default().require_tavily_api_key().unwrap_err();
            assert_eq!(err.to_string(), "TAVILY_API_KEY is required");
        }
    }
}
