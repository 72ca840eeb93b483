use crate::render::ReportData;
use anyhow::Context;

const REPORT_TEMPLATE: &str = include_str!("../../templates/report.html");
const PAYLOAD_MARKER: &str = "/*__REPORT_PAYLOAD__*/";

/// Expression the page sets once every chart has been drawn.
pub const READY_EXPRESSION: &str = "window.__chartsReady === true";

/// Fills the embedded report template with `data`.
pub fn render_page(data: &ReportData) -> anyhow::Result<String> {
    fill(REPORT_TEMPLATE, data)
}

fn fill(template: &str, data: &ReportData) -> anyhow::Result<String> {
    anyhow::ensure!(
        template.contains(PAYLOAD_MARKER),
        "report template is missing the payload marker"
    );

    let payload = serde_json::to_string(data).context("failed to serialize report payload")?;
    // '<', '>' and '&' only occur inside JSON strings, where \u escapes are
    // equivalent; escaping them keeps user text from closing the script tag.
    let payload = payload
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026");

    Ok(template.replacen(
        PAYLOAD_MARKER,
        &format!("window.__REPORT__ = {payload};"),
        1,
    ))
}
