use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionResponse, LlmConfig };
use crate::error::RelayError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Client for the OpenAI Responses API (`POST /v1/responses`).
pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    url: String,
}

#[derive(Serialize)]
struct OpenAIResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponsesResponse {
    output: Vec<OpenAIOutputItem>,
}

#[derive(Deserialize)]
struct OpenAIOutputItem {
    #[serde(default)]
    content: Vec<OpenAIContentBlock>,
}

#[derive(Deserialize)]
struct OpenAIContentBlock {
    text: Option<String>,
}

fn responses_url(base_url: &str) -> String {
    if base_url.ends_with("/v1/responses") {
        base_url.to_string()
    } else {
        format!("{}/v1/responses", base_url.trim_end_matches('/'))
    }
}

/// Text of the first content block of the first output item.
fn extract_text(body: &str) -> Result<String, RelayError> {
    let parsed: OpenAIResponsesResponse = serde_json
        ::from_str(body)
        .map_err(|e| RelayError::Upstream(format!("Unexpected response shape: {}", e)))?;

    parsed.output
        .first()
        .and_then(|item| item.content.first())
        .and_then(|block| block.text.as_deref())
        .map(|text| text.trim().to_string())
        .ok_or_else(|| RelayError::Upstream("No text in output[0].content[0]".to_string()))
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Option<std::time::Duration>
    ) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                RelayError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        let mut builder = HttpClient::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            url: responses_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, RelayError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| RelayError::Config("OpenAI API key is required".to_string()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), config.timeout)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, RelayError> {
        let req = OpenAIResponsesRequest {
            model: &self.model,
            input: prompt,
        };

        info!("Sending prompt with context to OpenAI ({})", self.model);
        debug!("OpenAI input:\n{}", prompt);

        let resp = self.http
            .post(&self.url)
            .json(&req)
            .send().await
            .map_err(|e| RelayError::Upstream(format!("Request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text().await
            .map_err(|e| RelayError::Upstream(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(RelayError::Upstream(format!("Unexpected status {}: {}", status, body)));
        }

        let response = extract_text(&body)?;
        Ok(CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
