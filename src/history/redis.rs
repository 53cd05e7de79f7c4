use async_trait::async_trait;
use crate::error::RelayError;
use crate::history::HistoryStore;
use crate::models::chat::{ ChatMessage, Role };
use chrono::Utc;
use log::{ debug, error };
use redis::{ AsyncCommands, Client };
use serde::{ Deserialize, Serialize };

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: Role,
    text: String,
    sequence: u64,
    timestamp: i64,
}

/// One Redis list per conversation, newest entry at the head.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
    cap: usize,
}

impl RedisHistoryStore {
    pub fn new(url: &str, key_prefix: &str, cap: usize) -> Result<Self, RelayError> {
        let client = Client::open(url).map_err(|e|
            RelayError::Config(format!("Invalid history store URL '{}': {}", url, e))
        )?;
        Ok(Self {
            client,
            key_prefix: key_prefix.to_string(),
            cap,
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn list_key(&self, conversation_id: &str) -> String {
        format!("{}{}", self.key_prefix, conversation_id)
    }

    fn sequence_key(&self, conversation_id: &str) -> String {
        format!("{}seq:{}", self.key_prefix, conversation_id)
    }
}

/// Decodes a newest-first `LRANGE` result into oldest-first messages.
fn decode_entries(conversation_id: &str, entries: &[String]) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = entries
        .iter()
        .filter_map(|entry| match serde_json::from_str::<StoredMessage>(entry) {
            Ok(msg) =>
                Some(ChatMessage {
                    conversation_key: conversation_id.to_string(),
                    role: msg.role,
                    text: msg.text,
                    sequence: msg.sequence,
                    timestamp: msg.timestamp,
                }),
            Err(e) => {
                error!("Error parsing history entry: {}", e);
                None
            }
        })
        .collect();
    messages.reverse();
    messages
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        text: &str
    ) -> Result<(), RelayError> {
        let mut conn = self.get_connection().await?;
        let key = self.list_key(conversation_id);
        let sequence: u64 = conn.incr(self.sequence_key(conversation_id), 1).await?;

        let message = StoredMessage {
            role,
            text: text.to_string(),
            sequence,
            timestamp: Utc::now().timestamp(),
        };
        let json_msg = serde_json
            ::to_string(&message)
            .map_err(|e| RelayError::History(format!("Failed to encode message: {}", e)))?;

        let _: () = redis
            ::pipe()
            .atomic()
            .lpush(&key, &json_msg)
            .ignore()
            .ltrim(&key, 0, (self.cap as isize) - 1)
            .ignore()
            .query_async(&mut conn).await?;

        debug!("Stored {} turn #{} under {}", role, sequence, key);
        Ok(())
    }

    async fn last(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Vec<ChatMessage>, RelayError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.get_connection().await?;
        let key = self.list_key(conversation_id);
        let json_entries: Vec<String> = conn.lrange(&key, 0, (limit as isize) - 1).await?;
        Ok(decode_entries(conversation_id, &json_entries))
    }
}
