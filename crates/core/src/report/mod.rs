//! End-to-end report workflow: refine, search, summarize, render, deliver.

pub mod error;

pub use error::{ReportError, Stage};

use crate::analysis::{FindingsSummarizer, IntakeRefiner, LlmAnalyst};
use crate::config::Settings;
use crate::delivery::resend::ResendMailer;
use crate::delivery::{Attachment, DeliveryReceipt, Mailer, OutgoingEmail};
use crate::domain::intake::Intake;
use crate::domain::locale::ReportLocale;
use crate::llm;
use crate::query::compose_query;
use crate::render::chrome::ChromeRenderer;
use crate::render::{ReportData, ReportRenderer};
use crate::search::tavily::TavilyClient;
use crate::search::{Findings, SearchProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const PDF_FILENAME: &str = "report.pdf";

fn report_email(locale: ReportLocale) -> (&'static str, &'static str) {
    match locale {
        ReportLocale::Korean => ("Sierra 투자 리포트", "<p>요청하신 리포트를 첨부합니다.</p>"),
        ReportLocale::English => (
            "Sierra investment report",
            "<p>Your requested report is attached.</p>",
        ),
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub pdf_filename: String,
    pub locale: ReportLocale,
    pub email_subject: String,
    pub email_html: String,
    pub default_dashboard_url: String,
    pub search_timeout: Duration,
    pub render_timeout: Duration,
}

impl ReportConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let locale = settings.report_locale();
        let (email_subject, email_html) = report_email(locale);
        Self {
            pdf_filename: PDF_FILENAME.to_string(),
            locale,
            email_subject: email_subject.to_string(),
            email_html: email_html.to_string(),
            default_dashboard_url: settings.dashboard_url.clone(),
            search_timeout: settings.search_timeout,
            render_timeout: settings.render_timeout,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildReportInput {
    pub intake: Intake,
    pub to_email: Option<String>,
    pub dashboard_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuildReportResult {
    pub refined: Intake,
    pub findings: Findings,
    pub narrative: String,
    pub document: Vec<u8>,
    pub document_name: String,
    pub delivery_id: Option<String>,
}

pub struct ReportOrchestrator {
    refiner: Arc<dyn IntakeRefiner>,
    search: Arc<dyn SearchProvider>,
    summarizer: Arc<dyn FindingsSummarizer>,
    renderer: Arc<dyn ReportRenderer>,
    mailer: Arc<dyn Mailer>,
    config: ReportConfig,
}

impl ReportOrchestrator {
    pub fn new(
        refiner: Arc<dyn IntakeRefiner>,
        search: Arc<dyn SearchProvider>,
        summarizer: Arc<dyn FindingsSummarizer>,
        renderer: Arc<dyn ReportRenderer>,
        mailer: Arc<dyn Mailer>,
        config: ReportConfig,
    ) -> Self {
        Self {
            refiner,
            search,
            summarizer,
            renderer,
            mailer,
            config,
        }
    }

    /// Wires the production providers. Fails when a required API key is
    /// missing.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let llm = llm::client_from_settings(settings)?;
        let analyst = Arc::new(LlmAnalyst::new(
            llm,
            settings.refine_strict,
            settings.report_language.clone(),
        ));

        Ok(Self::new(
            analyst.clone(),
            Arc::new(TavilyClient::from_settings(settings)?),
            analyst,
            Arc::new(ChromeRenderer::from_settings(settings)),
            Arc::new(ResendMailer::from_settings(settings)?),
            ReportConfig::from_settings(settings),
        ))
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub async fn refine(&self, intake: &Intake) -> Result<Intake, ReportError> {
        self.refiner
            .refine(intake)
            .await
            .map_err(|e| ReportError::new(Stage::Refinement, e))
    }

    pub async fn send_email(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, ReportError> {
        self.mailer
            .send(email)
            .await
            .map_err(|e| ReportError::new(Stage::Delivery, e))
    }

    pub async fn build_report(&self, input: BuildReportInput) -> Result<BuildReportResult, ReportError> {
        let report_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("build_report", %report_id);
        self.run(input).instrument(span).await
    }

    async fn run(&self, input: BuildReportInput) -> Result<BuildReportResult, ReportError> {
        let refined = self.refine(&input.intake).await?;
        tracing::info!(assets = refined.assets.len(), "intake refined");

        let query = compose_query(&refined);
        let findings = bounded(
            Stage::Search,
            self.config.search_timeout,
            self.search.search(&query),
        )
        .await?;
        tracing::info!(
            provider = self.search.provider_name(),
            hits = findings.hits.len(),
            "web search done"
        );

        let narrative = self
            .summarizer
            .summarize(&findings, &refined)
            .await
            .map_err(|e| ReportError::new(Stage::Summarization, e))?;

        let dashboard_url = input
            .dashboard_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.default_dashboard_url);
        let data = ReportData::assemble(
            &refined,
            &narrative,
            dashboard_url,
            chrono::Utc::now(),
            self.config.locale,
        );
        let document = bounded(
            Stage::Render,
            self.config.render_timeout,
            self.renderer.render(&data),
        )
        .await?;
        if document.is_empty() {
            return Err(ReportError::new(
                Stage::Render,
                anyhow::anyhow!("renderer produced an empty document"),
            ));
        }

        let recipient = input
            .to_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let delivery_id = match recipient {
            Some(to) => {
                let receipt = self
                    .send_email(&OutgoingEmail {
                        to: to.to_string(),
                        subject: self.config.email_subject.clone(),
                        html: self.config.email_html.clone(),
                        attachment: Some(Attachment {
                            filename: self.config.pdf_filename.clone(),
                            content: document.clone(),
                        }),
                    })
                    .await?;
                Some(receipt.id)
            }
            None => None,
        };

        tracing::info!(
            pdf_bytes = document.len(),
            delivered = delivery_id.is_some(),
            "report built"
        );
        Ok(BuildReportResult {
            refined,
            findings,
            narrative,
            document,
            document_name: self.config.pdf_filename.clone(),
            delivery_id,
        })
    }
}

/// Runs one stage under a deadline; elapsing counts as that stage failing.
async fn bounded<T>(
    stage: Stage,
    limit: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, ReportError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(|e| ReportError::new(stage, e)),
        Err(_) => Err(ReportError::new(
            stage,
            anyhow::anyhow!("timed out after {}s", limit.as_secs_f64()),
        )),
    }
}
