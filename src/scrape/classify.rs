//! ErrorClassifier — the single mapping from low-level failure signals to a
//! semantic outcome kind. Used by the explicit blocking-signature check on
//! page content and by the pipeline's catch-all boundary, so the scheduling
//! layer never sees a raw error.

use std::sync::OnceLock;

use aho_corasick::AhoCorasick;

use crate::core::types::FailureKind;

/// Page-content markers indicating the target actively refused automated
/// access. Scanned over the full rendered HTML.
const BLOCKING_SIGNATURES: &[&str] = &[
    "403 Forbidden",
    "429 Too Many Requests",
    "Access Denied",
    "Acesso negado",
];

static BLOCKING_MATCHER: OnceLock<AhoCorasick> = OnceLock::new();

fn blocking_matcher() -> &'static AhoCorasick {
    BLOCKING_MATCHER.get_or_init(|| {
        AhoCorasick::new(BLOCKING_SIGNATURES).expect("valid blocking patterns")
    })
}

/// Returns the first blocking marker found in `content`, if any.
pub fn blocking_signature(content: &str) -> Option<&'static str> {
    blocking_matcher()
        .find(content)
        .map(|m| BLOCKING_SIGNATURES[m.pattern().as_usize()])
}

/// Classify a raw failure signal (an error's display string).
///
/// * 403/429 markers → [`FailureKind::Blocked`]
/// * selector-wait timeouts → [`FailureKind::StructureChanged`]
/// * everything else (navigation, network, internal) →
///   [`FailureKind::Transient`], so an implementation bug can never
///   permanently kill a session.
pub fn classify(signal: &str) -> FailureKind {
    if signal.contains("403") || signal.contains("429") {
        return FailureKind::Blocked;
    }
    if signal.contains("waiting for selector") {
        return FailureKind::StructureChanged;
    }
    FailureKind::Transient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_block_codes_classify_blocked() {
        assert_eq!(
            classify("navigation to https://x failed: server returned 403"),
            FailureKind::Blocked
        );
        assert_eq!(classify("HTTP 429 rate limited"), FailureKind::Blocked);
    }

    #[test]
    fn selector_timeouts_classify_structure_changed() {
        assert_eq!(
            classify("timed out after 10000ms waiting for selector `#chat-messages li`"),
            FailureKind::StructureChanged
        );
    }

    #[test]
    fn everything_else_is_transient() {
        assert_eq!(classify("connection reset by peer"), FailureKind::Transient);
        assert_eq!(classify("navigation timed out after 30000ms"), FailureKind::Transient);
        assert_eq!(classify("unexpected internal state"), FailureKind::Transient);
    }

    #[test]
    fn page_content_markers_are_detected() {
        let page = "<html><body><h1>403 Forbidden</h1></body></html>";
        assert_eq!(blocking_signature(page), Some("403 Forbidden"));
        assert_eq!(blocking_signature("<ul><li>ola</li></ul>"), None);
    }
}
