use async_trait::async_trait;
use chrono::Utc;
use std::collections::{ HashMap, VecDeque };
use std::sync::atomic::{ AtomicU64, Ordering };
use tokio::sync::Mutex;
use crate::error::RelayError;
use crate::history::HistoryStore;
use crate::models::chat::{ ChatMessage, Role };

/// In-process store for local runs and tests. Nothing survives a restart.
pub struct MemoryHistoryStore {
    conversations: Mutex<HashMap<String, VecDeque<ChatMessage>>>,
    sequence: AtomicU64,
    cap: usize,
}

impl MemoryHistoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            cap,
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(
        &self,
        conversation_key: &str,
        role: Role,
        text: &str
    ) -> Result<(), RelayError> {
        let message = ChatMessage {
            conversation_key: conversation_key.to_string(),
            role,
            text: text.to_string(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            timestamp: Utc::now().timestamp(),
        };

        let mut conversations = self.conversations.lock().await;
        let log = conversations.entry(conversation_key.to_string()).or_default();
        log.push_back(message);
        while log.len() > self.cap {
            log.pop_front();
        }
        Ok(())
    }

    async fn last(
        &self,
        conversation_key: &str,
        limit: usize
    ) -> Result<Vec<ChatMessage>, RelayError> {
        let conversations = self.conversations.lock().await;
        let Some(log) = conversations.get(conversation_key) else {
            return Ok(Vec::new());
        };
        let skip = log.len().saturating_sub(limit);
        Ok(log.iter().skip(skip).cloned().collect())
    }
}
