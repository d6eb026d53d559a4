//! Extraction cascade: ordered, data-driven candidate rules for locating
//! chat messages in a rendered session page, plus the visible-text heuristic
//! used as a last resort when markup drifted but content is still readable.
//!
//! Adding or removing a target-site adaptation is a configuration change
//! (another entry in the cascade), not a pipeline change.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::browser::{BrowserError, BrowserPage};

/// One candidate extraction rule. The cascade evaluates strategies in rank
/// order; the first returning a non-empty set of raw texts wins.
#[async_trait]
pub trait ExtractStrategy: Send + Sync {
    /// Cascade position; lower runs first.
    fn rank(&self) -> u32;

    /// Human-readable label for logs.
    fn describe(&self) -> &str;

    /// `Ok(None)` means "no match here, try the next rule"; errors other
    /// than a selector wait timing out propagate to the pipeline boundary.
    async fn try_extract(
        &self,
        page: &dyn BrowserPage,
    ) -> Result<Option<Vec<String>>, BrowserError>;
}

/// CSS-selector rule: wait (bounded) for the selector, then read the text of
/// every matching element in document order.
pub struct SelectorStrategy {
    rank: u32,
    selector: String,
    label: String,
    wait: Duration,
}

impl SelectorStrategy {
    pub fn new(rank: u32, selector: impl Into<String>, wait: Duration) -> Self {
        let selector = selector.into();
        Self {
            rank,
            label: format!("selector `{}`", selector),
            selector,
            wait,
        }
    }
}

#[async_trait]
impl ExtractStrategy for SelectorStrategy {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn describe(&self) -> &str {
        &self.label
    }

    async fn try_extract(
        &self,
        page: &dyn BrowserPage,
    ) -> Result<Option<Vec<String>>, BrowserError> {
        match page.wait_for_selector(&self.selector, self.wait).await {
            Ok(()) => {}
            // No such element within the wait — not an error, just no match.
            Err(BrowserError::SelectorTimeout { .. }) => return Ok(None),
            Err(e) => return Err(e),
        }
        let texts = page.query_texts(&self.selector).await?;
        if texts.iter().all(|t| t.trim().is_empty()) {
            return Ok(None);
        }
        Ok(Some(texts))
    }
}

/// The statically configured cascade. The lead rule is the selector the
/// target has served for years; the alternates cover observed markup drifts
/// and get a short wait since the page is already settled by then.
pub fn default_cascade(primary_wait: Duration) -> Vec<Box<dyn ExtractStrategy>> {
    let alternate_wait = Duration::from_millis(2_000).min(primary_wait);
    vec![
        Box::new(SelectorStrategy::new(0, "#chat-messages li", primary_wait)),
        Box::new(SelectorStrategy::new(1, "#chat-messages .mensagem", alternate_wait)),
        Box::new(SelectorStrategy::new(2, "ul.mensagens li", alternate_wait)),
        Box::new(SelectorStrategy::new(3, ".chat-panel .message", alternate_wait)),
    ]
}

/// Visible text of a rendered page, split into trimmed non-empty lines.
/// Script, style, and template subtrees are excluded.
pub fn visible_text_lines(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector");
    let Some(body) = document.select(&body_selector).next() else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        for line in text.split('\n') {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
    }
    lines
}

/// Last-resort recovery: keep visible lines longer than `min_line_len` and
/// return a bounded trailing window in original order.
pub fn heuristic_lines(html: &str, min_line_len: usize, window: usize) -> Vec<String> {
    let kept: Vec<String> = visible_text_lines(html)
        .into_iter()
        .filter(|line| line.chars().count() > min_line_len)
        .collect();
    let start = kept.len().saturating_sub(window);
    kept[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><style>body { color: red; }</style></head>
        <body>
            <script>var tracking = "should never surface in visible text";</script>
            <nav>menu</nav>
            <div id="log">
                <p>Pregoeiro informa que a sessão foi reaberta para lances</p>
                <p>Fornecedor XYZ apresentou proposta no valor de R$ 1.200,00</p>
                <p>ok</p>
            </div>
        </body></html>"#;

    #[test]
    fn visible_text_excludes_script_and_style() {
        let lines = visible_text_lines(PAGE);
        assert!(lines.iter().any(|l| l.contains("Pregoeiro informa")));
        assert!(!lines.iter().any(|l| l.contains("tracking")));
        assert!(!lines.iter().any(|l| l.contains("color: red")));
    }

    #[test]
    fn heuristic_keeps_only_long_lines() {
        let lines = heuristic_lines(PAGE, 20, 15);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("sessão foi reaberta"));
        assert!(lines[1].contains("R$ 1.200,00"));
    }

    #[test]
    fn heuristic_window_is_trailing_and_ordered() {
        let html = format!(
            "<html><body>{}</body></html>",
            (1..=8)
                .map(|i| format!("<p>linha numero {i} com comprimento suficiente</p>"))
                .collect::<String>()
        );
        let lines = heuristic_lines(&html, 20, 3);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("numero 6"));
        assert!(lines[2].contains("numero 8"));
    }

    #[test]
    fn cascade_is_rank_ordered_with_original_selector_first() {
        let cascade = default_cascade(Duration::from_secs(10));
        assert!(cascade.windows(2).all(|w| w[0].rank() < w[1].rank()));
        assert!(cascade[0].describe().contains("#chat-messages li"));
    }
}
