//! Report document assembly and rendering.

pub mod chrome;
pub mod template;

use crate::domain::intake::{Intake, RiskProfile};
use crate::domain::locale::ReportLocale;
use crate::metrics::{AllocationSlice, DerivedMetrics, HoldingRow, Scores, StressTable};
use base64::Engine;
use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::Serialize;

const QR_SIZE_PX: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlossaryEntry {
    pub term: &'static str,
    pub def: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallToAction {
    pub title: String,
    pub url: String,
}

const GLOSSARY_KO: [GlossaryEntry; 3] = [
    GlossaryEntry {
        term: "변동성",
        def: "자산 수익률의 변동 폭. 높을수록 가격 흔들림이 큼.",
    },
    GlossaryEntry {
        term: "듀레이션",
        def: "금리변화에 대한 채권 가격 민감도.",
    },
    GlossaryEntry {
        term: "리밸런싱",
        def: "목표 비중에 맞춰 자산을 재조정하는 행위.",
    },
];

const GLOSSARY_EN: [GlossaryEntry; 3] = [
    GlossaryEntry {
        term: "Volatility",
        def: "How widely an asset's returns swing. Higher means larger price moves.",
    },
    GlossaryEntry {
        term: "Duration",
        def: "Sensitivity of a bond's price to changes in interest rates.",
    },
    GlossaryEntry {
        term: "Rebalancing",
        def: "Trading back to target weights after markets move the mix.",
    },
];

fn glossary(locale: ReportLocale) -> Vec<GlossaryEntry> {
    match locale {
        ReportLocale::Korean => GLOSSARY_KO.to_vec(),
        ReportLocale::English => GLOSSARY_EN.to_vec(),
    }
}

fn cta_title(locale: ReportLocale) -> &'static str {
    match locale {
        ReportLocale::Korean => "대시보드에서 가정 바꿔보기",
        ReportLocale::English => "Try different assumptions on the dashboard",
    }
}

/// SVG QR code for `url` as a `data:` URL the page can use as an image
/// source. `None` when the URL does not fit in a QR code.
pub fn qr_data_url(url: &str) -> Option<String> {
    let code = match QrCode::new(url.as_bytes()) {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!(error = %e, url_len = url.len(), "dashboard url does not fit a QR code");
            return None;
        }
    };
    let image = code
        .render::<svg::Color>()
        .min_dimensions(QR_SIZE_PX, QR_SIZE_PX)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    Some(format!(
        "data:image/svg+xml;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(image)
    ))
}

/// Everything the report page draws, serialized into the template as
/// `window.__REPORT__`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub lang: ReportLocale,
    pub created_at: DateTime<Utc>,
    pub profile: RiskProfile,
    pub allocation: Vec<AllocationSlice>,
    pub total_value_approx: f64,
    pub top5: Vec<HoldingRow>,
    pub gauges: Scores,
    pub stress: StressTable,
    pub insights: Vec<String>,
    pub glossary: Vec<GlossaryEntry>,
    pub cta: CallToAction,
    pub qr: Option<String>,
    pub narrative: String,
}

impl ReportData {
    pub fn assemble(
        intake: &Intake,
        narrative: &str,
        dashboard_url: &str,
        created_at: DateTime<Utc>,
        locale: ReportLocale,
    ) -> Self {
        let metrics = DerivedMetrics::derive(intake, locale);
        Self {
            lang: locale,
            created_at,
            profile: intake.profile.clone(),
            total_value_approx: metrics.allocation.total_value_approx,
            allocation: metrics.allocation.slices,
            top5: metrics.top_holdings,
            gauges: metrics.scores,
            stress: metrics.stress,
            insights: metrics.insights,
            glossary: glossary(locale),
            cta: CallToAction {
                title: cta_title(locale).to_string(),
                url: dashboard_url.to_string(),
            },
            qr: qr_data_url(dashboard_url),
            narrative: narrative.to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Renders the report to PDF bytes.
    async fn render(&self, data: &ReportData) -> anyhow::Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn assembles_payload_from_intake() {
        let intake: Intake = serde_json::from_value(json!({
            "assets": ["equity", "cash"],
            "profile": {"risk": "low", "horizon": "short", "goal": "preserve", "lossLimit": 5, "volPref": 10},
            "equity": [{"ticker": "KO", "qty": "10", "avgCost": "60"}],
            "cash": {"amount": "400"}
        }))
        .unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

        let data = ReportData::assemble(
            &intake,
            "## Summary",
            "https://dash.example",
            at,
            ReportLocale::English,
        );
        assert_eq!(data.total_value_approx, 1000.0);
        assert_eq!(data.top5.len(), 1);
        assert_eq!(data.stress.base, 600.0);
        assert_eq!(data.glossary.len(), 3);
        assert_eq!(data.cta.url, "https://dash.example");

        let v = serde_json::to_value(&data).unwrap();
        assert_eq!(v["createdAt"], json!("2026-03-01T09:00:00Z"));
        assert_eq!(v["gauges"]["riskScore"], json!(data.gauges.risk_score));
        assert_eq!(v["allocation"][1]["label"], json!("equity"));
        assert_eq!(v["allocation"][1]["value"], json!(60.0));
        assert_eq!(v["narrative"], json!("## Summary"));
        assert_eq!(v["lang"], json!("en"));
    }

    #[test]
    fn embeds_dashboard_qr_code() {
        let data = ReportData::assemble(
            &Intake::default(),
            "",
            "https://dash.example/p/42",
            Utc::now(),
            ReportLocale::Korean,
        );
        let qr = data.qr.expect("qr code for a short url");
        let encoded = qr
            .strip_prefix("data:image/svg+xml;base64,")
            .expect("svg data url");
        let image = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let image = String::from_utf8(image).unwrap();
        assert!(image.contains("<svg"));
    }

    #[test]
    fn oversized_url_has_no_qr_code() {
        assert!(qr_data_url(&"x".repeat(8000)).is_none());
    }

    #[test]
    fn korean_reports_use_korean_copy() {
        let data = ReportData::assemble(
            &Intake::default(),
            "",
            "https://dash.example",
            Utc::now(),
            ReportLocale::Korean,
        );
        assert_eq!(data.cta.title, "대시보드에서 가정 바꿔보기");
        assert_eq!(data.glossary[0].term, "변동성");
        assert!(data.insights.iter().any(|i| i.contains("손실허용 한도")));
    }
}
