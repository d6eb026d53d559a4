//! Persistence gateway. The orchestrator appends once per accepted message;
//! failures are logged by the caller and never abort a batch. The relational
//! backend lives outside this crate — [`MemoryStore`] backs the daemon and
//! the test suite.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::types::Message;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one message for a session. Best effort, not transactional.
    async fn append(&self, session_id: &str, text: &str) -> anyhow::Result<()>;

    /// Stored messages for a session, most-recent-first.
    async fn list(&self, session_id: &str, limit: usize, offset: usize) -> Vec<Message>;
}

/// In-memory append-only store, keyed by session id.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, Vec<(String, DateTime<Utc>)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored messages for a session; test observability.
    pub fn count(&self, session_id: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .get(session_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, session_id: &str, text: &str) -> anyhow::Result<()> {
        self.rows
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push((text.to_string(), Utc::now()));
        Ok(())
    }

    async fn list(&self, session_id: &str, limit: usize, offset: usize) -> Vec<Message> {
        let rows = self.rows.lock().unwrap();
        let Some(entries) = rows.get(session_id) else {
            return Vec::new();
        };
        entries
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .map(|(text, at)| Message {
                session_id: session_id.to_string(),
                text: text.clone(),
                observed_at: *at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_is_most_recent_first_with_paging() {
        let store = MemoryStore::new();
        for i in 1..=5 {
            store.append("s1", &format!("msg {i}")).await.unwrap();
        }

        let page = store.list("s1", 2, 0).await;
        assert_eq!(page[0].text, "msg 5");
        assert_eq!(page[1].text, "msg 4");

        let page = store.list("s1", 2, 2).await;
        assert_eq!(page[0].text, "msg 3");
        assert_eq!(page[1].text, "msg 2");

        assert!(store.list("unknown", 10, 0).await.is_empty());
    }
}
