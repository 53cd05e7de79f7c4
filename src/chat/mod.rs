pub mod auth;

use async_trait::async_trait;
use log::{ debug, info };
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RelayError;
use self::auth::TokenProvider;

pub const DEFAULT_CHAT_BASE_URL: &str = "https://chat.googleapis.com";

/// Posts replies into chat threads.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, thread_name: &str, text: &str) -> Result<(), RelayError>;
}

#[derive(Serialize, Debug)]
struct OutgoingMessage<'a> {
    text: &'a str,
    thread: ThreadRef<'a>,
}

#[derive(Serialize, Debug)]
struct ThreadRef<'a> {
    name: &'a str,
}

/// `spaces/{space}/threads/{thread}` → `{space}`.
pub fn space_id_from_thread(thread_name: &str) -> Option<&str> {
    thread_name.split('/').nth(1).filter(|s| !s.is_empty())
}

pub struct GoogleChatClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GoogleChatClient {
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Option<Duration>
    ) -> Result<Self, RelayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn messages_url(&self, space_id: &str) -> String {
        format!("{}/v1/spaces/{}/messages", self.base_url, space_id)
    }
}

#[async_trait]
impl MessageSender for GoogleChatClient {
    async fn send(&self, thread_name: &str, text: &str) -> Result<(), RelayError> {
        let space_id = space_id_from_thread(thread_name).ok_or_else(||
            RelayError::Delivery(format!("Thread name '{}' has no space segment", thread_name))
        )?;
        let url = self.messages_url(space_id);
        let payload = OutgoingMessage {
            text,
            thread: ThreadRef { name: thread_name },
        };
        debug!("Async GChat payload: {:?}", payload);

        let token = self.tokens.token().await?;
        let resp = self.http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .json(&payload)
            .send().await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let err_body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Delivery(format!("Unexpected status {}: {}", status, err_body)));
        }

        info!("Delivered reply to {} ({})", thread_name, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ extract::{ Path, State }, http::{ HeaderMap, StatusCode }, routing::post, Json, Router };
    use serde_json::{ json, Value };
    use tokio::sync::Mutex;

    struct StaticToken(&'static str);

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn token(&self) -> Result<String, RelayError> {
            Ok(self.0.to_string())
        }
    }

    struct NoToken;

    #[async_trait]
    impl TokenProvider for NoToken {
        async fn token(&self) -> Result<String, RelayError> {
            Err(RelayError::Auth("invalid_grant".to_string()))
        }
    }

    type Captured = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    async fn serve(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/v1/spaces/{space}/messages",
                post(
                    move |
                        State(captured): State<Captured>,
                        Path(space): Path<String>,
                        headers: HeaderMap,
                        Json(body): Json<Value>
                    | async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);
                        captured.lock().await.push((space, auth, body));
                        (status, "{}")
                    }
                )
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    #[test]
    fn space_id_is_second_segment() {
        assert_eq!(space_id_from_thread("spaces/AAA/threads/BBB"), Some("AAA"));
        assert_eq!(space_id_from_thread("spaces/AAA"), Some("AAA"));
        assert_eq!(space_id_from_thread("spaces"), None);
        assert_eq!(space_id_from_thread("spaces//threads/B"), None);
        assert_eq!(space_id_from_thread(""), None);
    }

    #[tokio::test]
    async fn posts_text_into_thread_with_bearer_token() {
        let (base, captured) = serve(StatusCode::OK).await;
        let client = GoogleChatClient::new(&base, Arc::new(StaticToken("ya29.token")), None).unwrap();

        client.send("spaces/AAA/threads/BBB", "Hello there").await.unwrap();

        let calls = captured.lock().await;
        assert_eq!(calls.len(), 1);
        let (space, auth, body) = &calls[0];
        assert_eq!(space, "AAA");
        assert_eq!(auth.as_deref(), Some("Bearer ya29.token"));
        assert_eq!(
            body,
            &json!({ "text": "Hello there", "thread": { "name": "spaces/AAA/threads/BBB" } })
        );
    }

    #[tokio::test]
    async fn rejected_post_is_a_delivery_error() {
        let (base, _) = serve(StatusCode::FORBIDDEN).await;
        let client = GoogleChatClient::new(&base, Arc::new(StaticToken("t")), None).unwrap();

        match client.send("spaces/AAA/threads/BBB", "hi").await {
            Err(RelayError::Delivery(msg)) => assert!(msg.contains("403")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn auth_failure_aborts_before_posting() {
        let (base, captured) = serve(StatusCode::OK).await;
        let client = GoogleChatClient::new(&base, Arc::new(NoToken), None).unwrap();

        assert!(matches!(client.send("spaces/AAA/threads/BBB", "hi").await, Err(RelayError::Auth(_))));
        assert!(captured.lock().await.is_empty());
    }

    #[tokio::test]
    async fn thread_without_space_is_rejected() {
        let client = GoogleChatClient::new(
            DEFAULT_CHAT_BASE_URL,
            Arc::new(StaticToken("t")),
            None
        ).unwrap();
        assert!(matches!(client.send("threads", "hi").await, Err(RelayError::Delivery(_))));
    }
}
