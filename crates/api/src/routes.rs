use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use sierra_core::delivery::{DeliveryReceipt, OutgoingEmail};
use sierra_core::domain::intake::Intake;
use sierra_core::report::{BuildReportInput, ReportOrchestrator};

use crate::error::ApiError;

const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_EMAIL_SUBJECT: &str = "Sierra 리포트";

#[derive(Clone)]
pub struct AppState {
    /// `None` when provider keys are missing; report routes answer 503.
    pub orchestrator: Option<Arc<ReportOrchestrator>>,
}

impl AppState {
    fn orchestrator(&self) -> Result<&ReportOrchestrator, ApiError> {
        self.orchestrator.as_deref().ok_or_else(ApiError::unavailable)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/intake/health", get(|| scope_health("intake")))
        .route("/api/report/health", get(|| scope_health("report")))
        .route("/api/email/health", get(|| scope_health("email")))
        .route("/api/intake", post(post_intake).fallback(method_not_allowed))
        .route("/api/report", post(post_report).fallback(method_not_allowed))
        .route("/api/email/send", post(post_email).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "service": "sierra-api" }))
}

async fn scope_health(scope: &'static str) -> Json<Value> {
    Json(json!({ "ok": true, "scope": scope }))
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

#[derive(Debug, Serialize)]
struct IntakeResponse {
    ok: bool,
    refined: Intake,
}

async fn post_intake(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<IntakeResponse>, ApiError> {
    let Json(raw) = payload?;
    let intake = Intake::from_submission(raw)?;
    let refined = state.orchestrator()?.refine(&intake).await?;

    Ok(Json(IntakeResponse { ok: true, refined }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest {
    intake: Option<Value>,
    to_email: Option<String>,
    dashboard_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportResponse {
    ok: bool,
    sent_email: bool,
    pdf_filename: String,
    pdf_size: usize,
    email_id: Option<String>,
    refined: Intake,
    markdown: String,
}

async fn post_report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let Json(req) = payload?;
    let raw = req
        .intake
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::bad_request("intake is required"))?;
    let intake = Intake::from_submission(raw)?;
    let orchestrator = state.orchestrator()?;

    let result = orchestrator
        .build_report(BuildReportInput {
            intake,
            to_email: req.to_email,
            dashboard_url: req.dashboard_url,
        })
        .await?;

    Ok(Json(ReportResponse {
        ok: true,
        sent_email: result.delivery_id.is_some(),
        pdf_filename: result.document_name,
        pdf_size: result.document.len(),
        email_id: result.delivery_id,
        refined: result.refined,
        markdown: result.narrative,
    }))
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    email: Option<String>,
    subject: Option<String>,
    html: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmailResponse {
    ok: bool,
    data: DeliveryReceipt,
}

async fn post_email(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<EmailResponse>, ApiError> {
    let Json(req) = payload?;
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(to), Some(html)) = (non_blank(req.email), non_blank(req.html)) else {
        return Err(ApiError::bad_request(
            "email, html is required (subject optional)",
        ));
    };
    let subject = non_blank(req.subject).unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.to_string());

    let data = state
        .orchestrator()?
        .send_email(&OutgoingEmail {
            to,
            subject,
            html,
            attachment: None,
        })
        .await?;

    Ok(Json(EmailResponse { ok: true, data }))
}
