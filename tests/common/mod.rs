//! Shared test doubles: a scripted browser engine so pipeline and scheduler
//! behavior can be exercised without a real Chromium process.
#![allow(dead_code)] // not every helper is used by every test binary

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use licita_sonar::browser::{BrowserEngine, BrowserError, BrowserPage, PageIdentity};
use licita_sonar::SonarConfig;

/// What the fake page serves for one launched session.
#[derive(Clone, Default)]
pub struct PageScript {
    /// Selector → inner texts of matching elements, in document order.
    pub selector_texts: HashMap<String, Vec<String>>,
    /// Full rendered HTML returned by `content()`.
    pub html: String,
    /// Every navigation attempt fails (primary and fallback).
    pub fail_navigation: bool,
    /// `query_texts` errors after a successful selector wait — simulates a
    /// failure in the middle of the extraction cascade.
    pub fail_query: bool,
}

impl PageScript {
    pub fn with_selector(mut self, selector: &str, texts: &[&str]) -> Self {
        self.selector_texts
            .insert(selector.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }
}

pub struct FakeEngine {
    script: PageScript,
    pub launches: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub fn new(script: PageScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            launches: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self, _identity: &PageIdentity) -> Result<Box<dyn BrowserPage>, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            script: self.script.clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct FakePage {
    script: PageScript,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        if self.script.fail_navigation {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                detail: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if self.script.selector_texts.contains_key(selector) {
            Ok(())
        } else {
            Err(BrowserError::SelectorTimeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn query_texts(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        if self.script.fail_query {
            return Err(BrowserError::Evaluate("context destroyed".to_string()));
        }
        Ok(self
            .script
            .selector_texts
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.script.html.clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Config tuned for fast tests: millisecond jitter, no dwell.
pub fn fast_config() -> SonarConfig {
    SonarConfig {
        jitter_min_ms: 10,
        jitter_max_ms: 20,
        navigation_timeout_ms: 1_000,
        selector_timeout_ms: 50,
        dwell_min_ms: 0,
        dwell_max_ms: 0,
        ..SonarConfig::default()
    }
}

/// Poll `cond` until it holds or `timeout` elapses; panics on timeout.
pub async fn wait_until(what: &str, timeout: Duration, mut cond: impl FnMut() -> bool) {
    let start = std::time::Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
