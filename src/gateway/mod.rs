pub mod broadcast;
pub mod store;

pub use broadcast::{BroadcastHub, Broadcaster, HubEvent};
pub use store::{MemoryStore, MessageStore};
