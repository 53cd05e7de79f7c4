use crate::error::RelayError;
use crate::history::{ self, format_history_for_prompt, HistoryStore };
use crate::llm::ChatClient;
use crate::models::chat::Role;

use log::{ error, info };
use std::sync::Arc;

pub const FALLBACK_REPLY: &str = "Sorry, I couldn't get a response from AI.";

/// Turns a user message into a model reply, using the conversation's recent
/// turns as context and recording the exchange once it succeeds.
#[derive(Clone)]
pub struct AIAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    history_limit: usize,
}

impl AIAgent {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        history_store: Arc<dyn HistoryStore>,
        history_limit: usize
    ) -> Self {
        Self { chat_client, history_store, history_limit }
    }

    /// Prompt for `user_text` given what is already stored for the conversation.
    pub async fn build_prompt(&self, conversation_key: &str, user_text: &str) -> String {
        let past = history::recent(
            self.history_store.as_ref(),
            conversation_key,
            self.history_limit
        ).await;

        format_history_for_prompt(
            past
                .iter()
                .map(|m| (m.role, m.text.as_str()))
                .chain(std::iter::once((Role::User, user_text)))
        )
    }

    /// Both turns are persisted only when the model produced a reply.
    pub async fn try_respond(
        &self,
        conversation_key: &str,
        user_text: &str
    ) -> Result<String, RelayError> {
        let prompt = self.build_prompt(conversation_key, user_text).await;
        let reply = self.chat_client.complete(&prompt).await?.response;

        let store = self.history_store.as_ref();
        history::record(store, conversation_key, Role::User, user_text).await;
        history::record(store, conversation_key, Role::Assistant, &reply).await;

        info!("Got reply for {} ({} chars)", conversation_key, reply.chars().count());
        Ok(reply)
    }

    pub async fn respond(&self, conversation_key: &str, user_text: &str) -> String {
        match self.try_respond(conversation_key, user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("OpenAI error for {}: {}", conversation_key, e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
