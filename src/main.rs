use std::sync::Arc;

use tracing::{info, warn};

use licita_sonar::browser::chromium::ChromiumEngine;
use licita_sonar::{
    load_config, BroadcastHub, MemoryStore, ScrapePipeline, SessionRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting session scraping service");

    let config = Arc::new(load_config());

    let engine = match config
        .resolve_chrome_executable()
        .map(ChromiumEngine::new)
        .or_else(ChromiumEngine::new_auto)
    {
        Some(engine) => {
            info!("using browser executable: {}", engine.executable());
            Arc::new(engine)
        }
        None => anyhow::bail!(
            "No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE."
        ),
    };

    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(BroadcastHub::default());

    let pipeline = Arc::new(ScrapePipeline::new(
        engine,
        store.clone(),
        hub.clone(),
        config.clone(),
    ));
    let registry = SessionRegistry::new(pipeline, config.clone());

    if config.sessions.is_empty() {
        warn!("no sessions configured; add session ids to licita-sonar.json");
    }
    for session_id in &config.sessions {
        registry.start(session_id);
    }

    shutdown_signal().await;

    info!("Shutting down gracefully...");
    registry.stop_all();

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
