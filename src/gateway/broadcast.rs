//! Broadcast gateway. The orchestrator publishes one `newMessage` event per
//! accepted message on a channel named after the session id; the realtime
//! transport that fans these out to websockets lives outside this crate.
//! [`BroadcastHub`] bridges the contract onto `tokio::sync::broadcast` so
//! in-process subscribers (and tests) can consume the stream.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish `event` with `payload` to every subscriber of `channel`.
    async fn publish(&self, channel: &str, event: &str, payload: Value) -> anyhow::Result<()>;
}

/// An event as seen by hub subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEvent {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

/// Single-process publish/subscribe hub. Subscribers receive every event and
/// filter by channel; lagging subscribers drop oldest events rather than
/// blocking publishers.
pub struct BroadcastHub {
    tx: broadcast::Sender<HubEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Broadcaster for BroadcastHub {
    async fn publish(&self, channel: &str, event: &str, payload: Value) -> anyhow::Result<()> {
        let delivered = self
            .tx
            .send(HubEvent {
                channel: channel.to_string(),
                event: event.to_string(),
                payload,
            })
            .unwrap_or(0); // no subscribers — publishing is still a success
        debug!("published {} on channel {} to {} subscribers", event, channel, delivered);
        Ok(())
    }
}
