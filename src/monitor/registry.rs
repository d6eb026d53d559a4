//! SessionRegistry — the owned, mutex-guarded table of monitored sessions
//! and the external control surface (`start` / `stop` / `stop_all` /
//! `run_once`). All mutation of session bookkeeping goes through here;
//! critical sections hold only handle bookkeeping, never a pipeline run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::core::config::SonarConfig;
use crate::core::types::{ScrapeOutcome, SessionState};
use crate::monitor::scheduler;
use crate::scrape::ScrapePipeline;

/// Scheduler feedback after one observed outcome.
pub(crate) enum Feedback {
    Continue,
    Halt,
}

struct SessionEntry {
    state: SessionState,
    consecutive_failures: u32,
    last_run_at: Option<DateTime<Utc>>,
    stop_tx: watch::Sender<bool>,
}

pub(crate) struct RegistryInner {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    /// One run lock per session id, kept across stop/start so a restarted
    /// schedule can never overlap a still-draining old run. Entries are tiny
    /// and session ids are bounded, so the map is never pruned.
    run_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    pub(crate) pipeline: Arc<ScrapePipeline>,
    pub(crate) config: Arc<SonarConfig>,
}

impl RegistryInner {
    fn run_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.run_locks
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Feed one outcome back into the session record. Called by the
    /// scheduler after every completed run.
    pub(crate) fn observe_outcome(&self, session_id: &str, outcome: &ScrapeOutcome) -> Feedback {
        let mut sessions = self.sessions.lock().unwrap();
        let Some(entry) = sessions.get_mut(session_id) else {
            // Stopped while the run was in flight; nothing left to schedule.
            return Feedback::Halt;
        };
        entry.last_run_at = Some(Utc::now());

        match outcome {
            ScrapeOutcome::Success(_) => {
                entry.consecutive_failures = 0;
                Feedback::Continue
            }
            ScrapeOutcome::Blocked { detail } => {
                warn!(
                    "session {}: blocked ({}), suspending until explicit restart",
                    session_id, detail
                );
                entry.state = SessionState::Suspended;
                Feedback::Halt
            }
            ScrapeOutcome::StructureChanged { .. } | ScrapeOutcome::Transient { .. } => {
                entry.consecutive_failures += 1;
                if let Some(cap) = self.config.max_consecutive_failures {
                    if entry.consecutive_failures >= cap {
                        warn!(
                            "session {}: {} consecutive failures, suspending",
                            session_id, entry.consecutive_failures
                        );
                        entry.state = SessionState::Suspended;
                        return Feedback::Halt;
                    }
                }
                Feedback::Continue
            }
        }
    }
}

/// Control surface over the monitored-session table. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(pipeline: Arc<ScrapePipeline>, config: Arc<SonarConfig>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: Mutex::new(HashMap::new()),
                run_locks: Mutex::new(HashMap::new()),
                pipeline,
                config,
            }),
        }
    }

    /// Arm monitoring for a session. Idempotent: calling it for an already
    /// active session is a logged no-op; a suspended session is restarted
    /// with its failure count reset.
    pub fn start(&self, session_id: &str) {
        let mut sessions = self.inner.sessions.lock().unwrap();

        if let Some(entry) = sessions.get(session_id) {
            if entry.state == SessionState::Active {
                info!("already scraping session {}", session_id);
                return;
            }
        }

        let last_run_at = sessions.get(session_id).and_then(|e| e.last_run_at);
        let (stop_tx, stop_rx) = watch::channel(false);
        let run_lock = self.inner.run_lock(session_id);
        tokio::spawn(scheduler::session_loop(
            self.inner.clone(),
            session_id.to_string(),
            stop_rx,
            run_lock,
        ));

        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                state: SessionState::Active,
                consecutive_failures: 0,
                last_run_at,
                stop_tx,
            },
        );
    }

    /// Disarm and forget a session. Non-blocking: an in-flight run finishes
    /// on its own and may still persist/broadcast what it gathered; only
    /// future scheduling is prevented.
    pub fn stop(&self, session_id: &str) {
        let removed = self.inner.sessions.lock().unwrap().remove(session_id);
        match removed {
            Some(entry) => {
                info!("stopping scraping for session {}", session_id);
                let _ = entry.stop_tx.send(true);
            }
            None => {
                info!("stop requested for unknown session {}", session_id);
            }
        }
    }

    /// Disarm everything; used on process shutdown.
    pub fn stop_all(&self) {
        let mut sessions = self.inner.sessions.lock().unwrap();
        info!("stopping all {} scraping sessions", sessions.len());
        for (_, entry) in sessions.drain() {
            let _ = entry.stop_tx.send(true);
        }
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.session_state(session_id) == Some(SessionState::Active)
    }

    pub fn session_state(&self, session_id: &str) -> Option<SessionState> {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|e| e.state)
    }

    /// Number of sessions with an armed schedule.
    pub fn active_count(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.state == SessionState::Active)
            .count()
    }

    pub fn consecutive_failures(&self, session_id: &str) -> Option<u32> {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|e| e.consecutive_failures)
    }

    pub fn last_run_at(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .and_then(|e| e.last_run_at)
    }

    /// Manual on-demand cycle for diagnostics, outside the schedule. Takes
    /// the session's run lock so it cannot overlap a scheduled run.
    pub async fn run_once(&self, session_id: &str) -> ScrapeOutcome {
        let run_lock = self.inner.run_lock(session_id);
        let _guard = run_lock.lock().await;
        self.inner.pipeline.run(session_id).await
    }
}
