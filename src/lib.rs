pub mod browser;
pub mod core;
pub mod gateway;
pub mod monitor;
pub mod scrape;

// --- Primary exports ---
pub use crate::core::config::{load_config, SonarConfig};
pub use crate::core::types::{FailureKind, Message, NewMessageEvent, ScrapeOutcome, SessionState};
pub use crate::gateway::{BroadcastHub, Broadcaster, MemoryStore, MessageStore};
pub use crate::monitor::SessionRegistry;
pub use crate::scrape::{ScrapePipeline, NEW_MESSAGE_EVENT};
