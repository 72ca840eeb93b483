//! PDF rendering through a headless Chromium driven over the DevTools
//! protocol.
//!
//! Each render launches its own browser with a throwaway profile directory.
//! The process is killed and the directory removed on every exit path: the
//! happy path closes explicitly, and error or cancellation paths rely on
//! `kill_on_drop` and `TempDir`'s destructor.

use crate::config::Settings;
use crate::render::template::{self, READY_EXPRESSION};
use crate::render::{ReportData, ReportRenderer};
use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const DEFAULT_CHROME_PATH: &str = "chromium";
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
const CLOSE_GRACE: Duration = Duration::from_secs(2);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEVTOOLS_BANNER: &str = "DevTools listening on ";

const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

fn mm(v: f64) -> f64 {
    v / 25.4
}

#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    chrome_path: PathBuf,
    ready_timeout: Duration,
}

impl ChromeRenderer {
    pub fn new(chrome_path: impl Into<PathBuf>, ready_timeout: Duration) -> Self {
        Self {
            chrome_path: chrome_path.into(),
            ready_timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let chrome_path = settings
            .chrome_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CHROME_PATH.to_string());
        Self::new(chrome_path, settings.render_ready_timeout)
    }
}

#[async_trait::async_trait]
impl ReportRenderer for ChromeRenderer {
    async fn render(&self, data: &ReportData) -> Result<Vec<u8>> {
        let page = template::render_page(data)?;

        let started = Instant::now();
        let mut session = BrowserSession::launch(&self.chrome_path).await?;
        let result = session.print_page(&page, self.ready_timeout).await;
        session.close().await;

        if let Ok(pdf) = &result {
            tracing::info!(
                bytes = pdf.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "report rendered"
            );
        }
        result
    }
}

/// One browser process plus its profile directory and DevTools connection.
struct BrowserSession {
    child: Child,
    workdir: TempDir,
    cdp: CdpConnection,
}

impl BrowserSession {
    async fn launch(chrome_path: &Path) -> Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("sierra-render-")
            .tempdir()
            .context("failed to create browser working directory")?;

        let mut child = Command::new(chrome_path)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--no-first-run",
                "--no-default-browser-check",
                "--disable-extensions",
                "--hide-scrollbars",
                "--mute-audio",
                "--remote-debugging-port=0",
            ])
            .arg(format!(
                "--user-data-dir={}",
                workdir.path().join("profile").display()
            ))
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to launch browser at {}", chrome_path.display()))?;

        let stderr = child
            .stderr
            .take()
            .context("browser stderr was not captured")?;
        let mut lines = BufReader::new(stderr).lines();

        let ws_url = timeout(LAUNCH_TIMEOUT, wait_for_devtools_url(&mut lines))
            .await
            .context("timed out waiting for the browser DevTools endpoint")??;
        tracing::debug!(%ws_url, pid = child.id(), "browser started");

        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::trace!(target: "chromium", "{line}");
            }
        });

        let cdp = CdpConnection::connect(&ws_url).await?;
        Ok(Self {
            child,
            workdir,
            cdp,
        })
    }

    async fn print_page(&mut self, html: &str, ready_timeout: Duration) -> Result<Vec<u8>> {
        let page_path = self.workdir.path().join("report.html");
        tokio::fs::write(&page_path, html)
            .await
            .context("failed to write report page")?;
        let page_url = format!("file://{}", page_path.display());

        let target = self
            .cdp
            .call("Target.createTarget", json!({"url": "about:blank"}), None)
            .await?;
        let target_id = target["targetId"]
            .as_str()
            .context("Target.createTarget returned no targetId")?
            .to_string();

        let attached = self
            .cdp
            .call(
                "Target.attachToTarget",
                json!({"targetId": target_id, "flatten": true}),
                None,
            )
            .await?;
        let session_id = attached["sessionId"]
            .as_str()
            .context("Target.attachToTarget returned no sessionId")?
            .to_string();
        let sid = Some(session_id.as_str());

        self.cdp.call("Page.enable", json!({}), sid).await?;
        let nav = self
            .cdp
            .call("Page.navigate", json!({"url": page_url}), sid)
            .await?;
        if let Some(err) = nav.get("errorText").and_then(Value::as_str) {
            bail!("failed to load report page: {err}");
        }

        self.wait_until_ready(sid, ready_timeout).await?;

        let printed = self
            .cdp
            .call(
                "Page.printToPDF",
                json!({
                    "printBackground": true,
                    "paperWidth": A4_WIDTH_IN,
                    "paperHeight": A4_HEIGHT_IN,
                    "marginTop": mm(14.0),
                    "marginRight": mm(12.0),
                    "marginBottom": mm(16.0),
                    "marginLeft": mm(12.0),
                }),
                sid,
            )
            .await?;
        let data = printed["data"]
            .as_str()
            .context("Page.printToPDF returned no data")?;

        base64::engine::general_purpose::STANDARD
            .decode(data)
            .context("Page.printToPDF returned invalid base64")
    }

    async fn wait_until_ready(&mut self, sid: Option<&str>, ready_timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + ready_timeout;
        loop {
            let check = self
                .cdp
                .call(
                    "Runtime.evaluate",
                    json!({"expression": READY_EXPRESSION, "returnByValue": true}),
                    sid,
                )
                .await;
            match check {
                Ok(v) if v.pointer("/result/value") == Some(&Value::Bool(true)) => return Ok(()),
                Ok(_) => {}
                Err(e) => tracing::trace!(error = %e, "readiness check failed"),
            }

            if Instant::now() >= deadline {
                bail!(
                    "report page did not signal readiness within {}s",
                    ready_timeout.as_secs()
                );
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn close(mut self) {
        let _ = timeout(CLOSE_GRACE, self.cdp.call("Browser.close", json!({}), None)).await;
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "browser already exited");
        }
        if let Err(e) = self.workdir.close() {
            tracing::warn!(error = %e, "failed to remove browser working directory");
        }
    }
}

async fn wait_for_devtools_url(lines: &mut Lines<BufReader<ChildStderr>>) -> Result<String> {
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read browser stderr")?
    {
        if let Some(url) = devtools_url(&line) {
            return Ok(url);
        }
        tracing::trace!(target: "chromium", "{line}");
    }
    bail!("browser exited before announcing its DevTools endpoint")
}

fn devtools_url(line: &str) -> Option<String> {
    let url = line.trim().strip_prefix(DEVTOOLS_BANNER)?;
    url.starts_with("ws://").then(|| url.to_string())
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct CdpConnection {
    ws: WsStream,
    next_id: u64,
}

impl CdpConnection {
    async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("failed to connect to DevTools at {url}"))?;
        Ok(Self { ws, next_id: 0 })
    }

    /// Sends one command and waits for its reply, skipping events and
    /// replies to other ids.
    async fn call(&mut self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;

        let mut command = json!({"id": id, "method": method, "params": params});
        if let Some(sid) = session_id {
            command["sessionId"] = json!(sid);
        }
        self.ws
            .send(Message::Text(command.to_string().into()))
            .await
            .with_context(|| format!("failed to send {method}"))?;

        while let Some(frame) = self.ws.next().await {
            let frame = frame.with_context(|| format!("DevTools connection failed during {method}"))?;
            let Message::Text(text) = frame else {
                continue;
            };
            let message: Value = serde_json::from_str(&text)
                .with_context(|| format!("invalid DevTools message during {method}"))?;
            if let Some(reply) = match_reply(&message, id) {
                return reply.with_context(|| format!("{method} failed"));
            }
        }
        bail!("DevTools connection closed while waiting for {method}")
    }
}

fn match_reply(message: &Value, id: u64) -> Option<Result<Value>> {
    if message.get("id").and_then(Value::as_u64) != Some(id) {
        return None;
    }
    if let Some(err) = message.get("error") {
        return Some(Err(anyhow!("DevTools error: {err}")));
    }
    Some(Ok(message.get("result").cloned().unwrap_or(Value::Null)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devtools_banner() {
        assert_eq!(
            devtools_url("DevTools listening on ws://127.0.0.1:40123/devtools/browser/ab-cd\n"),
            Some("ws://127.0.0.1:40123/devtools/browser/ab-cd".to_string())
        );
        assert_eq!(devtools_url("[1019/101010.1:ERROR:gpu_init.cc] oops"), None);
        assert_eq!(devtools_url("DevTools listening on nothing"), None);
    }

    #[test]
    fn matches_replies_by_id() {
        let event = json!({"method": "Page.loadEventFired", "params": {}});
        assert!(match_reply(&event, 1).is_none());

        let other = json!({"id": 2, "result": {}});
        assert!(match_reply(&other, 1).is_none());

        let ok = json!({"id": 3, "result": {"targetId": "T1"}});
        assert_eq!(match_reply(&ok, 3).unwrap().unwrap()["targetId"], "T1");

        let err = json!({"id": 4, "error": {"code": -32000, "message": "No target"}});
        let e = match_reply(&err, 4).unwrap().unwrap_err();
        assert!(e.to_string().contains("No target"));
    }

    #[test]
    fn a4_margins_are_in_inches() {
        assert!((mm(14.0) - 0.551).abs() < 0.001);
        assert!((mm(12.0) - 0.472).abs() < 0.001);
    }

    #[test]
    fn takes_binary_and_ready_wait_from_settings() {
        let settings = Settings {
            chrome_path: Some("/opt/chrome/chrome".to_string()),
            render_ready_timeout: Duration::from_secs(40),
            ..Settings::default()
        };
        let renderer = ChromeRenderer::from_settings(&settings);
        assert_eq!(renderer.chrome_path, PathBuf::from("/opt/chrome/chrome"));
        assert_eq!(renderer.ready_timeout, Duration::from_secs(40));

        let renderer = ChromeRenderer::from_settings(&Settings::default());
        assert_eq!(renderer.chrome_path, PathBuf::from(DEFAULT_CHROME_PATH));
        assert_eq!(renderer.ready_timeout, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn missing_browser_binary_is_an_error() {
        let renderer = ChromeRenderer::new("/nonexistent/chromium-binary", Duration::from_secs(1));
        let data = ReportData::assemble(
            &crate::domain::intake::Intake::default(),
            "x",
            "https://d.example",
            chrono::Utc::now(),
            crate::domain::locale::ReportLocale::English,
        );
        let err = renderer.render(&data).await.unwrap_err();
        assert!(err.to_string().contains("failed to launch browser"));
    }
}
