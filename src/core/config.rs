use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

// ---------------------------------------------------------------------------
// SonarConfig — file-based config loader (licita-sonar.json) with env-var
// fallback for the paths that matter at bootstrap.
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "LICITA_SONAR_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

fn default_base_url() -> Url {
    Url::parse("https://licitacoes-e2.bb.com.br").expect("static base url")
}

fn default_jitter_min_ms() -> u64 {
    5_000
}
fn default_jitter_max_ms() -> u64 {
    15_000
}
fn default_navigation_timeout_ms() -> u64 {
    30_000
}
fn default_selector_timeout_ms() -> u64 {
    10_000
}
fn default_dwell_min_ms() -> u64 {
    2_000
}
fn default_dwell_max_ms() -> u64 {
    10_000
}
fn default_message_window() -> usize {
    10
}
fn default_heuristic_min_line_len() -> usize {
    20
}
fn default_heuristic_window() -> usize {
    15
}

/// Runtime configuration for the monitor daemon.
///
/// Every field has a working default so a missing or partial
/// `licita-sonar.json` still yields a usable config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SonarConfig {
    /// Root of the target site; session pages hang off `/sessao/{id}`.
    pub base_url: Url,
    /// Session ids to start monitoring at boot.
    pub sessions: Vec<String>,
    /// Jittered scheduling window between scrape cycles, per session.
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    /// Upper bound for one navigation attempt (primary or fallback URL).
    pub navigation_timeout_ms: u64,
    /// Upper bound for each selector wait in the extraction cascade.
    pub selector_timeout_ms: u64,
    /// Post-load dwell window for the human-interaction simulation.
    pub dwell_min_ms: u64,
    pub dwell_max_ms: u64,
    /// How many trailing messages a successful cycle reports.
    pub message_window: usize,
    /// Heuristic fallback: minimum visible-text line length to keep.
    pub heuristic_min_line_len: usize,
    /// Heuristic fallback: trailing window of kept lines.
    pub heuristic_window: usize,
    /// Optional cap on consecutive recoverable failures before the session
    /// is suspended. `None` retries forever, matching the base contract.
    pub max_consecutive_failures: Option<u32>,
    /// Explicit browser executable; `CHROME_EXECUTABLE` and auto-discovery
    /// apply when unset.
    pub chrome_executable: Option<String>,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sessions: Vec::new(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            selector_timeout_ms: default_selector_timeout_ms(),
            dwell_min_ms: default_dwell_min_ms(),
            dwell_max_ms: default_dwell_max_ms(),
            message_window: default_message_window(),
            heuristic_min_line_len: default_heuristic_min_line_len(),
            heuristic_window: default_heuristic_window(),
            max_consecutive_failures: None,
            chrome_executable: None,
        }
    }
}

impl SonarConfig {
    /// Deep-linked chat resource for a session — the primary navigation target.
    pub fn chat_url(&self, session_id: &str) -> String {
        format!(
            "{}/sessao/{}/chat",
            self.base_url.as_str().trim_end_matches('/'),
            session_id
        )
    }

    /// Simpler canonical session page, used when the deep link fails.
    pub fn session_url(&self, session_id: &str) -> String {
        format!(
            "{}/sessao/{}",
            self.base_url.as_str().trim_end_matches('/'),
            session_id
        )
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    /// Browser executable: config field → `CHROME_EXECUTABLE` env var →
    /// `None` (caller falls back to auto-discovery).
    pub fn resolve_chrome_executable(&self) -> Option<String> {
        if let Some(p) = &self.chrome_executable {
            if !p.trim().is_empty() {
                return Some(p.clone());
            }
        }
        let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
        let p = p.trim();
        if p.is_empty() || !Path::new(p).exists() {
            return None;
        }
        Some(p.to_string())
    }
}

/// Load `licita-sonar.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `LICITA_SONAR_CONFIG` env var path
/// 2. `./licita-sonar.json` (process cwd)
/// 3. `../licita-sonar.json` (repo root when running from a subdir)
/// 4. `~/.licita-sonar/licita-sonar.json`
///
/// Missing file → `SonarConfig::default()` (silent).
/// Parse error → log a warning, return `SonarConfig::default()`.
pub fn load_config() -> SonarConfig {
    let mut candidates: Vec<PathBuf> = vec![
        PathBuf::from("licita-sonar.json"),
        PathBuf::from("../licita-sonar.json"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".licita-sonar").join("licita-sonar.json"));
    }
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<SonarConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("licita-sonar.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "licita-sonar.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return SonarConfig::default();
                }
            },
            Err(_) => continue, // not found at this path — try next
        }
    }

    SonarConfig::default()
}
