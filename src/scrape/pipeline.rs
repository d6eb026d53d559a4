//! ScrapePipeline — drives one anti-detection extraction cycle end to end:
//! fresh identity, navigation with fallback URL, human-interaction
//! simulation, strategy cascade, blocking check, heuristic recovery, outcome
//! classification, and guaranteed browser release.
//!
//! The pipeline is the sole classification boundary: `run` always returns a
//! [`ScrapeOutcome`], never an error.

use std::sync::Arc;

use chrono::Utc;
use rand::RngExt;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

use crate::browser::{BrowserEngine, BrowserError, BrowserPage};
use crate::core::config::SonarConfig;
use crate::core::types::{FailureKind, Message, NewMessageEvent, ScrapeOutcome};
use crate::gateway::{Broadcaster, MessageStore};
use crate::scrape::classify::{blocking_signature, classify};
use crate::scrape::identity::random_identity;
use crate::scrape::strategy::{default_cascade, heuristic_lines, ExtractStrategy};

/// Event name used for every published message.
pub const NEW_MESSAGE_EVENT: &str = "newMessage";

pub struct ScrapePipeline {
    engine: Arc<dyn BrowserEngine>,
    store: Arc<dyn MessageStore>,
    broadcaster: Arc<dyn Broadcaster>,
    strategies: Vec<Box<dyn ExtractStrategy>>,
    config: Arc<SonarConfig>,
}

impl ScrapePipeline {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        store: Arc<dyn MessageStore>,
        broadcaster: Arc<dyn Broadcaster>,
        config: Arc<SonarConfig>,
    ) -> Self {
        let strategies = default_cascade(config.selector_timeout());
        Self {
            engine,
            store,
            broadcaster,
            strategies,
            config,
        }
    }

    /// Replace the extraction cascade (site adaptations, tests).
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// One full scrape cycle for `session_id`.
    pub async fn run(&self, session_id: &str) -> ScrapeOutcome {
        info!("scraping session {}", session_id);

        let identity = random_identity();
        let page = match self.engine.launch(&identity).await {
            Ok(page) => page,
            Err(e) => return self.failure_outcome(session_id, &e.to_string()),
        };

        let result = self.drive(session_id, page.as_ref()).await;

        // Release the browser on every exit path before looking at the result.
        if let Err(e) = page.close().await {
            warn!("session {}: browser release error: {}", session_id, e);
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => self.failure_outcome(session_id, &e.to_string()),
        };

        if let ScrapeOutcome::Success(messages) = &outcome {
            info!(
                "session {}: scraped {} messages",
                session_id,
                messages.len()
            );
            self.deliver(session_id, messages).await;
        }
        outcome
    }

    /// Stages 2-6. Any `Err` is classified by the caller.
    async fn drive(
        &self,
        session_id: &str,
        page: &dyn BrowserPage,
    ) -> Result<ScrapeOutcome, BrowserError> {
        // Navigation: deep link first, canonical session page as fallback.
        let primary = self.config.chat_url(session_id);
        if let Err(e) = self.navigate_bounded(page, &primary).await {
            warn!(
                "session {}: primary navigation failed ({}), trying fallback",
                session_id, e
            );
            let fallback = self.config.session_url(session_id);
            self.navigate_bounded(page, &fallback).await?;
        }

        self.simulate_reader(session_id, page).await;

        // Extraction cascade: first non-empty match wins.
        let observed_at = Utc::now();
        let mut messages: Vec<Message> = Vec::new();
        for strategy in &self.strategies {
            match strategy.try_extract(page).await? {
                Some(texts) => {
                    messages = texts
                        .iter()
                        .filter_map(|raw| Message::from_raw(session_id, raw, observed_at))
                        .collect();
                    if !messages.is_empty() {
                        debug!(
                            "session {}: {} matched {} messages",
                            session_id,
                            strategy.describe(),
                            messages.len()
                        );
                        break;
                    }
                }
                None => {
                    debug!("session {}: {} had no match", session_id, strategy.describe());
                }
            }
        }

        if messages.is_empty() {
            let content = page.content().await?;

            if let Some(marker) = blocking_signature(&content) {
                warn!("session {}: possible blocking detected ({})", session_id, marker);
                return Ok(ScrapeOutcome::Blocked {
                    detail: format!("blocking signature in page content: {}", marker),
                });
            }

            // Markup drifted but the page may still carry readable content.
            messages = heuristic_lines(
                &content,
                self.config.heuristic_min_line_len,
                self.config.heuristic_window,
            )
            .iter()
            .filter_map(|raw| Message::from_raw(session_id, raw, observed_at))
            .collect();

            if messages.is_empty() {
                warn!("session {}: structure may have changed", session_id);
                return Ok(ScrapeOutcome::StructureChanged {
                    detail: "no strategy matched and heuristic found no content".to_string(),
                });
            }
            debug!(
                "session {}: heuristic fallback recovered {} lines",
                session_id,
                messages.len()
            );
        }

        // Bounded recent window, oldest-appearing first.
        let start = messages.len().saturating_sub(self.config.message_window);
        Ok(ScrapeOutcome::Success(messages.split_off(start)))
    }

    async fn navigate_bounded(
        &self,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<(), BrowserError> {
        match timeout(self.config.navigation_timeout(), page.navigate(url)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: self.config.navigation_timeout_ms,
            }),
        }
    }

    /// Stage 3: lower the automation-detection signal. Purely cosmetic for
    /// extraction, so every failure is swallowed and logged.
    async fn simulate_reader(&self, session_id: &str, page: &dyn BrowserPage) {
        let (scroll_px, dwell_ms, click_x, click_y) = {
            let mut rng = rand::rng();
            let (vw, vh) = crate::scrape::identity::VIEWPORT;
            (
                rng.random_range(100u32..=300),
                rng.random_range(self.config.dwell_min_ms..=self.config.dwell_max_ms.max(self.config.dwell_min_ms)),
                rng.random_range(0..vw / 10),
                rng.random_range(0..vh / 10),
            )
        };

        if let Err(e) = page
            .evaluate(&format!("window.scrollBy(0, {}); true", scroll_px))
            .await
        {
            debug!("session {}: scroll simulation error: {}", session_id, e);
        }

        sleep(Duration::from_millis(dwell_ms)).await;

        // Click confined to the top-left tenth of the page, away from
        // anything interactive.
        let click = format!(
            "(() => {{ const el = document.elementFromPoint({x}, {y}); \
             if (el) el.dispatchEvent(new MouseEvent('click', {{clientX: {x}, clientY: {y}, bubbles: true}})); \
             return true; }})()",
            x = click_x,
            y = click_y
        );
        if let Err(e) = page.evaluate(&click).await {
            debug!("session {}: click simulation error: {}", session_id, e);
        }
    }

    fn failure_outcome(&self, session_id: &str, signal: &str) -> ScrapeOutcome {
        match classify(signal) {
            FailureKind::Blocked => {
                warn!("session {}: possible blocking detected: {}", session_id, signal);
                ScrapeOutcome::Blocked {
                    detail: signal.to_string(),
                }
            }
            FailureKind::StructureChanged => {
                warn!("session {}: structure may have changed: {}", session_id, signal);
                ScrapeOutcome::StructureChanged {
                    detail: signal.to_string(),
                }
            }
            FailureKind::Transient => {
                warn!("session {}: scrape failed: {}", session_id, signal);
                ScrapeOutcome::Transient {
                    detail: signal.to_string(),
                }
            }
        }
    }

    /// Hand a successful batch to the collaborators: persist each message
    /// (best effort), then publish it on the session channel.
    async fn deliver(&self, session_id: &str, messages: &[Message]) {
        for message in messages {
            if let Err(e) = self.store.append(session_id, &message.text).await {
                tracing::error!(
                    "session {}: failed to persist message: {}",
                    session_id,
                    e
                );
            }
            let payload = match serde_json::to_value(NewMessageEvent::from_message(message)) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!("session {}: payload encode error: {}", session_id, e);
                    continue;
                }
            };
            if let Err(e) = self
                .broadcaster
                .publish(session_id, NEW_MESSAGE_EVENT, payload)
                .await
            {
                tracing::error!("session {}: publish failed: {}", session_id, e);
            }
        }
    }
}
