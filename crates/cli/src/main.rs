use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sierra_core::config::Settings;
use sierra_core::domain::intake::Intake;
use sierra_core::llm::error::LlmDiagnosticsError;
use sierra_core::metrics::DerivedMetrics;
use sierra_core::report::{BuildReportInput, ReportOrchestrator};

#[derive(Debug, Parser)]
#[command(name = "sierra_report")]
struct Args {
    /// Intake JSON file, same shape as the `POST /api/intake` body.
    #[arg(long)]
    intake: PathBuf,

    /// Where to write the PDF.
    #[arg(long, default_value = "report.pdf")]
    out: PathBuf,

    /// Email the PDF to this address.
    #[arg(long)]
    to_email: Option<String>,

    #[arg(long)]
    dashboard_url: Option<String>,

    /// Print the derived metrics as JSON and skip every provider call.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let intake = load_intake(&args.intake)?;

    if args.dry_run {
        let metrics = DerivedMetrics::derive(&intake, settings.report_locale());
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        tracing::info!(dry_run = true, "derived metrics only");
        return Ok(());
    }

    let orchestrator = ReportOrchestrator::from_settings(&settings)?;
    let result = orchestrator
        .build_report(BuildReportInput {
            intake,
            to_email: args.to_email,
            dashboard_url: args.dashboard_url,
        })
        .await;

    match result {
        Ok(report) => {
            tokio::fs::write(&args.out, &report.document)
                .await
                .with_context(|| format!("failed to write {}", args.out.display()))?;
            tracing::info!(
                out = %args.out.display(),
                bytes = report.document.len(),
                email_id = report.delivery_id.as_deref().unwrap_or("-"),
                "report written"
            );
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err.source);
            if let Some(diag) = err.source.downcast_ref::<LlmDiagnosticsError>() {
                tracing::error!(
                    provider = ?diag.provider,
                    llm_stage = diag.stage,
                    raw_output = diag.raw_output.as_deref().unwrap_or(""),
                    "language model call failed"
                );
            }
            tracing::error!(stage = %err.stage, error = %err, "report run failed");
            Err(err.into())
        }
    }
}

fn load_intake(path: &Path) -> anyhow::Result<Intake> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Intake::from_submission(raw).with_context(|| format!("invalid intake in {}", path.display()))
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
