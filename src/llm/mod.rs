pub mod openai;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use crate::cli::Args;
use crate::error::RelayError;
use self::openai::OpenAIChatClient;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, RelayError>;

    fn get_model(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.trim().is_empty()),
            completion_model: Some(args.chat_model.clone()).filter(|m| !m.is_empty()),
            base_url: Some(args.chat_base_url.clone()).filter(|u| !u.is_empty()),
            timeout: Some(Duration::from_secs(args.http_timeout_secs)),
        }
    }
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, RelayError> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
