mod memory;
mod redis;

pub use memory::MemoryHistoryStore;
pub use redis::RedisHistoryStore;

use async_trait::async_trait;
use log::{ error, info };
use std::sync::Arc;
use crate::cli::Args;
use crate::error::RelayError;
use crate::models::chat::{ ChatMessage, Role };

/// Capped append log of turns, keyed by conversation.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stores a turn, then evicts the oldest turns beyond the store's cap.
    async fn append(
        &self,
        conversation_key: &str,
        role: Role,
        text: &str
    ) -> Result<(), RelayError>;

    /// Up to `limit` most recent turns, oldest first.
    async fn last(
        &self,
        conversation_key: &str,
        limit: usize
    ) -> Result<Vec<ChatMessage>, RelayError>;
}

pub fn create_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, RelayError> {
    let cap = args.history_limit.max(1);
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = RedisHistoryStore::new(&args.history_host, &args.history_redis_prefix, cap)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new(cap))),
        other => Err(RelayError::Config(format!("Unsupported history store type: {}", other))),
    }
}

pub fn initialize_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, RelayError> {
    info!("Chat history will be stored in: {} at {}", args.history_type, args.history_host);
    create_history_store(args)
}

/// Best-effort append: failures are logged and dropped.
pub async fn record(store: &dyn HistoryStore, conversation_key: &str, role: Role, text: &str) {
    if let Err(e) = store.append(conversation_key, role, text).await {
        error!("Failed to save {} turn for {}: {}", role, conversation_key, e);
    }
}

/// Best-effort read: a failing store yields an empty history.
pub async fn recent(store: &dyn HistoryStore, conversation_key: &str, limit: usize) -> Vec<ChatMessage> {
    match store.last(conversation_key, limit).await {
        Ok(messages) => messages,
        Err(e) => {
            error!("Failed to load history for {}: {}", conversation_key, e);
            Vec::new()
        }
    }
}

/// Linearizes turns into `role: text` lines, oldest first.
pub fn format_history_for_prompt<'a, I>(turns: I) -> String
    where I: IntoIterator<Item = (Role, &'a str)>
{
    turns
        .into_iter()
        .map(|(role, text)| format!("{}: {}", role, text))
        .collect::<Vec<_>>()
        .join("\n")
}
