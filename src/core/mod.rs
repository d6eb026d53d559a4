pub mod config;
pub mod types;

pub use config::SonarConfig;
pub use types::{FailureKind, Message, NewMessageEvent, ScrapeOutcome, SessionState};
