//! Per-cycle fingerprint material: user-agent rotation, locale/encoding
//! headers, fixed desktop viewport. Each scrape cycle draws a fresh identity
//! so consecutive runs of the same session do not present identical
//! fingerprints.

use rand::seq::IndexedRandom;

use crate::browser::PageIdentity;

/// Realistic desktop user agents for rotation.
pub const USER_AGENTS: &[&str] = &[
    // Chrome — Windows / macOS / Linux
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox — Windows / macOS / Linux
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari — macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    // Edge — Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Fixed desktop viewport. Kept constant across runs so viewport variance
/// does not become its own fingerprinting signal.
pub const VIEWPORT: (u32, u32) = (1920, 1080);

/// Returns a randomly chosen user agent from the pool.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Locale and encoding headers the target expects from a Brazilian visitor.
pub fn stealth_headers() -> Vec<(String, String)> {
    vec![
        (
            "Accept-Language".to_string(),
            "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        ),
        ("Accept-Encoding".to_string(), "gzip, deflate, br".to_string()),
        ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
    ]
}

/// Draw a complete identity for one scrape cycle.
pub fn random_identity() -> PageIdentity {
    PageIdentity {
        user_agent: random_user_agent().to_string(),
        headers: stealth_headers(),
        viewport: VIEWPORT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_holds_realistic_agents() {
        assert!(!USER_AGENTS.is_empty());
        assert!(USER_AGENTS.iter().all(|ua| ua.starts_with("Mozilla/5.0")));
    }

    #[test]
    fn identity_is_complete() {
        let id = random_identity();
        assert!(USER_AGENTS.contains(&id.user_agent.as_str()));
        assert_eq!(id.viewport, VIEWPORT);
        assert!(id
            .headers
            .iter()
            .any(|(k, v)| k == "Accept-Language" && v.starts_with("pt-BR")));
    }
}
