//! Inbound Google Chat event payloads.
//!
//! Every field is optional and looked up on its own: a field that is missing
//! or has an unexpected JSON type reads as absent without affecting the rest
//! of the event.

use serde_json::Value as JsonValue;

pub const ADDED_TO_SPACE: &str = "ADDED_TO_SPACE";
pub const DIRECT_MESSAGE_SPACE: &str = "DM";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub event_type: Option<String>,
    pub payload: Option<MessagePayload>,
}

/// The `chat.messagePayload` part of a message event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessagePayload {
    pub text: Option<String>,
    pub thread_name: Option<String>,
    pub space_name: Option<String>,
    pub space_type: Option<String>,
}

fn string_at(root: &JsonValue, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(root, |node, key| node.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

impl ChatEvent {
    /// Only a body that is not JSON at all fails.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        let root: JsonValue = serde_json::from_slice(body)?;
        Ok(Self::from_value(&root))
    }

    pub fn from_value(root: &JsonValue) -> Self {
        let payload = root
            .get("chat")
            .and_then(|c| c.get("messagePayload"))
            .filter(|p| p.is_object())
            .map(MessagePayload::from_value);

        Self {
            event_type: string_at(root, &["type"]),
            payload,
        }
    }

    pub fn message_payload(&self) -> Option<&MessagePayload> {
        self.payload.as_ref()
    }
}

impl MessagePayload {
    fn from_value(payload: &JsonValue) -> Self {
        Self {
            text: string_at(payload, &["message", "text"]),
            thread_name: string_at(payload, &["message", "thread", "name"]),
            space_name: string_at(payload, &["space", "name"]),
            space_type: string_at(payload, &["space", "type"]),
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn thread_name(&self) -> &str {
        self.thread_name.as_deref().unwrap_or("")
    }

    pub fn is_direct_message(&self) -> bool {
        self.space_type.as_deref() == Some(DIRECT_MESSAGE_SPACE)
    }

    pub fn space_name(&self) -> Option<&str> {
        self.space_name.as_deref().filter(|n| !n.is_empty())
    }
}
