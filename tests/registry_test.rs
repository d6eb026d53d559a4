//! Scheduler/registry properties: idempotent start, suspension on blocking,
//! resumption after recoverable errors, stop semantics, the optional
//! failure cap, and the manual trigger.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, wait_until, FakeEngine, PageScript};
use licita_sonar::{
    BroadcastHub, MemoryStore, ScrapeOutcome, ScrapePipeline, SessionRegistry, SessionState,
    SonarConfig,
};

const PRIMARY: &str = "#chat-messages li";

fn registry_with(engine: Arc<FakeEngine>, config: SonarConfig) -> SessionRegistry {
    let config = Arc::new(config);
    let pipeline = Arc::new(ScrapePipeline::new(
        engine,
        Arc::new(MemoryStore::new()),
        Arc::new(BroadcastHub::default()),
        config.clone(),
    ));
    SessionRegistry::new(pipeline, config)
}

fn success_script() -> PageScript {
    PageScript::default().with_selector(PRIMARY, &["lance recebido"])
}

fn blocked_script() -> PageScript {
    PageScript::default().with_html("<html><body>429 Too Many Requests</body></html>")
}

fn transient_script() -> PageScript {
    PageScript {
        fail_navigation: true,
        ..PageScript::default()
    }
}

#[tokio::test]
async fn redundant_starts_arm_exactly_one_schedule() {
    let engine = FakeEngine::new(success_script());
    let registry = registry_with(engine.clone(), fast_config());

    for _ in 0..5 {
        registry.start("sess-1");
    }

    assert!(registry.is_active("sess-1"));
    assert_eq!(registry.active_count(), 1);

    registry.stop_all();
}

#[tokio::test]
async fn scheduled_runs_repeat_while_successful() {
    let engine = FakeEngine::new(success_script());
    let registry = registry_with(engine.clone(), fast_config());

    registry.start("sess-1");
    wait_until("two scheduled runs", Duration::from_secs(5), || {
        engine.launch_count() >= 2
    })
    .await;

    assert_eq!(registry.session_state("sess-1"), Some(SessionState::Active));
    assert_eq!(registry.consecutive_failures("sess-1"), Some(0));
    assert!(registry.last_run_at("sess-1").is_some());

    registry.stop_all();
}

#[tokio::test]
async fn blocked_outcome_suspends_and_disarms() {
    let engine = FakeEngine::new(blocked_script());
    let registry = registry_with(engine.clone(), fast_config());

    registry.start("sess-1");
    wait_until("suspension", Duration::from_secs(5), || {
        registry.session_state("sess-1") == Some(SessionState::Suspended)
    })
    .await;

    assert!(!registry.is_active("sess-1"));
    assert_eq!(registry.active_count(), 0);

    // Entry stays for observability, but no further run is scheduled.
    let runs_at_suspension = engine.launch_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(engine.launch_count(), runs_at_suspension);
}

#[tokio::test]
async fn suspended_session_restarts_on_explicit_start() {
    let engine = FakeEngine::new(blocked_script());
    let registry = registry_with(engine.clone(), fast_config());

    registry.start("sess-1");
    wait_until("suspension", Duration::from_secs(5), || {
        registry.session_state("sess-1") == Some(SessionState::Suspended)
    })
    .await;

    let runs_before_restart = engine.launch_count();
    registry.start("sess-1");
    assert!(registry.is_active("sess-1"));
    assert_eq!(registry.consecutive_failures("sess-1"), Some(0));

    wait_until("post-restart run", Duration::from_secs(5), || {
        engine.launch_count() > runs_before_restart
    })
    .await;

    registry.stop_all();
}

#[tokio::test]
async fn recoverable_errors_keep_the_session_active() {
    let engine = FakeEngine::new(transient_script());
    let registry = registry_with(engine.clone(), fast_config());

    registry.start("sess-1");
    wait_until("repeated retries", Duration::from_secs(5), || {
        engine.launch_count() >= 3
    })
    .await;

    assert_eq!(registry.session_state("sess-1"), Some(SessionState::Active));
    assert!(registry.consecutive_failures("sess-1").unwrap_or(0) >= 1);

    registry.stop_all();
}

#[tokio::test]
async fn failure_cap_suspends_after_repeated_recoverable_errors() {
    let engine = FakeEngine::new(transient_script());
    let config = SonarConfig {
        max_consecutive_failures: Some(2),
        ..fast_config()
    };
    let registry = registry_with(engine.clone(), config);

    registry.start("sess-1");
    wait_until("cap suspension", Duration::from_secs(5), || {
        registry.session_state("sess-1") == Some(SessionState::Suspended)
    })
    .await;

    assert_eq!(registry.consecutive_failures("sess-1"), Some(2));

    let runs_at_suspension = engine.launch_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(engine.launch_count(), runs_at_suspension);
}

#[tokio::test]
async fn stop_removes_the_session() {
    let engine = FakeEngine::new(success_script());
    let registry = registry_with(engine.clone(), fast_config());

    registry.start("sess-1");
    assert!(registry.is_active("sess-1"));

    registry.stop("sess-1");
    assert!(!registry.is_active("sess-1"));
    assert_eq!(registry.session_state("sess-1"), None);
    assert_eq!(registry.active_count(), 0);

    // Stopping an unknown session is a no-op.
    registry.stop("never-started");
}

#[tokio::test]
async fn stop_all_disarms_every_session() {
    let engine = FakeEngine::new(success_script());
    let registry = registry_with(engine.clone(), fast_config());

    for id in ["a", "b", "c"] {
        registry.start(id);
    }
    assert_eq!(registry.active_count(), 3);

    registry.stop_all();
    assert_eq!(registry.active_count(), 0);
    assert_eq!(registry.session_state("a"), None);
}

#[tokio::test]
async fn run_once_surfaces_the_classified_outcome() {
    let engine = FakeEngine::new(blocked_script());
    let registry = registry_with(engine.clone(), fast_config());

    // No scheduled session needed; the manual trigger runs directly.
    let outcome = registry.run_once("diagnostic").await;
    assert!(matches!(outcome, ScrapeOutcome::Blocked { .. }));
    assert_eq!(engine.launch_count(), 1);
    assert_eq!(engine.close_count(), 1);
}

#[tokio::test]
async fn run_once_succeeds_alongside_a_scheduled_session() {
    let engine = FakeEngine::new(success_script());
    let registry = registry_with(engine.clone(), fast_config());

    registry.start("sess-1");
    let outcome = registry.run_once("sess-1").await;

    let ScrapeOutcome::Success(messages) = outcome else {
        panic!("expected success");
    };
    assert_eq!(messages[0].text, "lance recebido");

    registry.stop_all();
}
