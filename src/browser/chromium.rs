//! Native browser engine on `chromiumoxide`.
//!
//! * Finds a usable Chromium-family executable (env override → PATH scan →
//!   well-known install paths).
//! * Launches one fresh headless browser per scrape cycle with stealth flags;
//!   no cookies or state survive between cycles, so every run presents a
//!   clean fingerprint.
//! * Applies the per-run identity (user agent, locale/encoding headers)
//!   through CDP overrides before navigation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{BrowserEngine, BrowserError, BrowserPage, PageIdentity};

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan — finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
            "brave",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/brave-browser",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Build a headless `BrowserConfig` for one monitoring cycle.
///
/// Flags chosen for:
/// * Compatibility with CI / restricted environments (`--no-sandbox`,
///   `--disable-dev-shm-usage`).
/// * Stealth — `--disable-blink-features=AutomationControlled` hides the
///   `navigator.webdriver` flag; the UA comes from the per-run identity.
fn build_headless_config(exe: &str, identity: &PageIdentity) -> Result<BrowserConfig, BrowserError> {
    let (width, height) = identity.viewport;

    BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", identity.user_agent))
        .build()
        .map_err(|e| BrowserError::Launch(format!("browser config: {}", e)))
}

/// Production [`BrowserEngine`]: launches a fresh headless Chromium per run.
pub struct ChromiumEngine {
    exe: String,
}

impl ChromiumEngine {
    pub fn new(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }

    /// Engine using the auto-discovered executable.
    /// `None` when no browser is installed on this machine.
    pub fn new_auto() -> Option<Self> {
        find_chrome_executable().map(Self::new)
    }

    pub fn executable(&self) -> &str {
        &self.exe
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self, identity: &PageIdentity) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let config = build_headless_config(&self.exe, identity)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(format!("{}: {}", self.exe, e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(format!("failed to open tab: {}", e)))?;

        let mut ua_builder =
            SetUserAgentOverrideParams::builder().user_agent(identity.user_agent.clone());
        if let Some((_, lang)) = identity.headers.iter().find(|(k, _)| k == "Accept-Language") {
            ua_builder = ua_builder.accept_language(lang.clone());
        }
        let ua_override = ua_builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("user agent override: {}", e)))?;
        page.set_user_agent(ua_override)
            .await
            .map_err(|e| BrowserError::Launch(format!("failed to set user agent: {}", e)))?;

        let headers_json = serde_json::Value::Object(
            identity
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        );
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers_json)))
            .await
            .map_err(|e| BrowserError::Launch(format!("failed to set headers: {}", e)))?;

        Ok(Box::new(CdpPage {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task: std::sync::Mutex::new(Some(handler_task)),
        }))
    }
}

/// One live tab in a dedicated browser process.
struct CdpPage {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[async_trait]
impl BrowserPage for CdpPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page.goto(url).await.map_err(|e| BrowserError::Navigation {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| BrowserError::Evaluate(e.to_string()))
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let poll = Duration::from_millis(250);
        let start = std::time::Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(BrowserError::SelectorTimeout {
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn query_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        // Selector embedded as a JSON string literal so quoting is safe.
        let script = format!(
            "Array.from(document.querySelectorAll({})).map(el => el.innerText || el.textContent || '')",
            serde_json::to_string(selector).map_err(|e| BrowserError::Evaluate(e.to_string()))?
        );
        let value = self.evaluate(&script).await?;
        let texts = value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(texts)
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Content(e.to_string()))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("browser close error (non-fatal): {}", e);
            }
        }
        if let Ok(mut h) = self.handler_task.lock() {
            if let Some(task) = h.take() {
                task.abort();
            }
        }
        Ok(())
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        // Backstop only — `close()` is the normal path. Drop cannot await, so
        // when a browser is still held, hand it to the runtime to close and
        // avoid zombie Chromium processes. The handler task must outlive the
        // close call (it drives the CDP connection), so it is aborted inside
        // the spawned task.
        let handler_task = self
            .handler_task
            .lock()
            .ok()
            .and_then(|mut h| h.take());
        let browser = self
            .browser
            .try_lock()
            .ok()
            .and_then(|mut guard| guard.take());

        match (browser, tokio::runtime::Handle::try_current()) {
            (Some(mut browser), Ok(handle)) => {
                handle.spawn(async move {
                    let _ = browser.close().await;
                    if let Some(task) = handler_task {
                        task.abort();
                    }
                });
            }
            _ => {
                if let Some(task) = handler_task {
                    task.abort();
                }
            }
        }
    }
}
