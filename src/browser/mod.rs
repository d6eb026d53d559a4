//! Browser-automation capability surface.
//!
//! The pipeline drives the target site through these traits only; the
//! production implementation lives in [`chromium`] and tests substitute
//! scripted fakes. One engine launch = one isolated browser context with a
//! fresh identity — contexts are never shared or pooled across runs.

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Per-run fingerprint applied before navigation: user agent, extra HTTP
/// headers, and a fixed desktop viewport.
#[derive(Debug, Clone)]
pub struct PageIdentity {
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    pub viewport: (u32, u32),
}

/// Typed browser-layer failure. The `Display` strings double as the
/// low-level signals fed to `scrape::classify`, so wording is part of the
/// contract (notably "waiting for selector").
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {detail}")]
    Navigation { url: String, detail: String },
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },
    #[error("timed out after {timeout_ms}ms waiting for selector `{selector}`")]
    SelectorTimeout { selector: String, timeout_ms: u64 },
    #[error("script evaluation failed: {0}")]
    Evaluate(String),
    #[error("failed to read page content: {0}")]
    Content(String),
}

/// Launches isolated browser sessions. One call to [`BrowserEngine::launch`]
/// per scrape cycle.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, identity: &PageIdentity) -> Result<Box<dyn BrowserPage>, BrowserError>;
}

/// A live page inside one launched browser session.
///
/// `close` must be called on every exit path; implementations also carry a
/// drop backstop so an early return cannot leak the underlying process.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load to settle. The caller bounds this
    /// with its own timeout.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Evaluate a script in page context and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Resolve once `selector` matches at least one element, or fail with
    /// [`BrowserError::SelectorTimeout`].
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Inner text of every element matching `selector`, in document order.
    async fn query_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError>;

    /// Full rendered page HTML.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Release the underlying browser session. Idempotent.
    async fn close(&self) -> Result<(), BrowserError>;
}
