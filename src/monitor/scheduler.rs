//! Per-session scheduling loop.
//!
//! Self-rescheduling, not fixed-rate: the next cycle is armed only after the
//! current one finishes and its outcome has been acted on, so a slow run can
//! never overlap the next one. A fresh random delay is drawn from the jitter
//! window on every cycle to avoid a predictable polling cadence.

use std::sync::Arc;

use rand::RngExt;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::core::config::SonarConfig;
use crate::monitor::registry::{Feedback, RegistryInner};

/// Fresh per-cycle jitter within the configured window.
fn jitter_delay(config: &SonarConfig) -> Duration {
    let max = config.jitter_max_ms.max(config.jitter_min_ms);
    let ms = rand::rng().random_range(config.jitter_min_ms..=max);
    Duration::from_millis(ms)
}

/// Runs until stopped, suspended, or the registry entry disappears.
///
/// The stop signal is only honored while idle: once a pipeline run has
/// started it always completes and releases its resources, even if the
/// session was stopped meanwhile.
pub(crate) async fn session_loop(
    inner: Arc<RegistryInner>,
    session_id: String,
    mut stop_rx: watch::Receiver<bool>,
    run_lock: Arc<Mutex<()>>,
) {
    info!("starting scraping for session {}", session_id);

    loop {
        let delay = jitter_delay(&inner.config);
        debug!("session {}: next cycle in {:?}", session_id, delay);

        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = sleep(delay) => {}
        }

        let outcome = {
            // Serializes with run_once; the scheduler itself never overlaps
            // because the next arm happens only after this block.
            let _guard = run_lock.lock().await;
            if *stop_rx.borrow() {
                break;
            }
            inner.pipeline.run(&session_id).await
        };

        // Stop may have landed mid-run; the run still delivered, but its
        // outcome must not feed a record this loop no longer owns.
        if *stop_rx.borrow() {
            break;
        }

        match inner.observe_outcome(&session_id, &outcome) {
            Feedback::Continue => {
                if !outcome.is_success() {
                    warn!(
                        "session {}: cycle ended {}, will retry on schedule",
                        session_id,
                        outcome.label()
                    );
                }
            }
            Feedback::Halt => break,
        }
    }

    debug!("scheduler for session {} disarmed", session_id);
}
