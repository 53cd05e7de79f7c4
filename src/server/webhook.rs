use axum::{
    body::Bytes,
    extract::{ rejection::BytesRejection, State },
    http::{ HeaderMap, StatusCode },
    response::{ IntoResponse, Response },
    Json,
};
use hmac::{ Hmac, Mac };
use log::{ debug, info, warn };
use serde_json::json;
use sha2::Sha256;

use super::AppState;
use crate::dispatch::RelayJob;
use crate::error::RelayError;
use crate::models::event::{ ChatEvent, ADDED_TO_SPACE };

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-relay-signature";

/// What to do with one inbound event.
#[derive(Debug, PartialEq, Eq)]
pub enum EventAction {
    Relay(RelayJob),
    Greet,
    Ignore,
}

pub fn route_event(event: &ChatEvent) -> EventAction {
    if let Some(payload) = event.message_payload() {
        let text = payload.text();
        let thread_name = payload.thread_name();
        info!("Detected GCHAT message in thread: {}", thread_name);

        if text.is_empty() || thread_name.is_empty() {
            return EventAction::Ignore;
        }

        // DMs share one history per space; group threads each get their own.
        let conversation_key = match payload.space_name() {
            Some(space) if payload.is_direct_message() => space,
            _ => thread_name,
        };

        return EventAction::Relay(RelayJob {
            thread_name: thread_name.to_string(),
            conversation_key: conversation_key.to_string(),
            text: text.to_string(),
        });
    }

    if event.event_type.as_deref() == Some(ADDED_TO_SPACE) {
        return EventAction::Greet;
    }

    EventAction::Ignore
}

/// Checks `sha256=<hex>` against an HMAC-SHA256 of the raw body.
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(hex_part) = signature.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_part) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn parse_event(body: &[u8]) -> ChatEvent {
    match ChatEvent::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            warn!("{}", RelayError::Parse(e.to_string()));
            ChatEvent::default()
        }
    }
}

pub async fn handle_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>
) -> Response {
    // An unreadable or oversized body is handled like a malformed one.
    let body = body.unwrap_or_else(|e| {
        warn!("{}", RelayError::Parse(e.to_string()));
        Bytes::new()
    });

    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(&body, signature, secret) {
            warn!("Rejected event with bad or missing signature");
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }
    }

    let event = parse_event(&body);
    debug!("Incoming event: {:?}", event);

    match route_event(&event) {
        EventAction::Relay(job) => {
            info!("Dispatching reply for conversation {}", job.conversation_key);
            state.dispatcher.dispatch(job);
            Json(json!({})).into_response()
        }
        EventAction::Greet => Json(json!({ "text": &*state.greeting })).into_response(),
        EventAction::Ignore => Json(json!({})).into_response(),
    }
}

pub async fn health() -> &'static str {
    "ok"
}
