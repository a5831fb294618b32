//! Outbound side of the relay: chat-completion wire types and the endpoint seam.

use std::time::Duration;

use async_trait::async_trait;
use relay_common::{RelayError, Result};
use serde::{Deserialize, Serialize};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: "system".into(), content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self { role: "user".into(), content: content.into() } }
}

/// Non-streaming chat-completion request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Content of the last `user` message, if any.
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages.iter().rev().find(|m| m.role == "user").map(|m| m.content.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Extracts `choices[0].message.content`, rejecting any other shape.
pub fn parse_completion_text(body: &[u8]) -> Result<String> {
    let parsed: ChatCompletionResponse =
        serde_json::from_slice(body).map_err(|e| RelayError::MalformedResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| RelayError::MalformedResponse("response has no choices".into()))
}

#[async_trait]
pub trait ChatCompletionEndpoint: Send + Sync {
    /// Sends one request and returns the assistant text once the body is fully received.
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    /// Pass-through client: connect timeout only, so long event streams are not cut off.
    stream_client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpEndpoint {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        let mut stream_builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
            stream_builder = stream_builder.connect_timeout(t);
        }
        let client = builder.build().map_err(|e| RelayError::Config(format!("http client: {e}")))?;
        let stream_client = stream_builder.build().map_err(|e| RelayError::Config(format!("http client: {e}")))?;
        Ok(Self { client, stream_client, url: format!("{}{}", base_url.trim_end_matches('/'), CHAT_COMPLETIONS_PATH), api_key })
    }

    pub fn url(&self) -> &str { &self.url }

    fn post(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let builder = client.post(&self.url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Forwards an arbitrary client body untouched; only a 2xx response is returned.
    pub async fn forward(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let resp = self.post(&self.stream_client).json(body).send().await.map_err(|e| RelayError::upstream(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            tracing::warn!(target: "upstream", "pass-through got status {}", status);
            return Err(RelayError::status(status.as_u16()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatCompletionEndpoint for HttpEndpoint {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String> {
        let resp = self.post(&self.client).json(request).send().await.map_err(|e| RelayError::upstream(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::status(status.as_u16()));
        }
        let body = resp.bytes().await.map_err(|e| RelayError::upstream(e.to_string()))?;
        parse_completion_text(&body)
    }
}

#[cfg(feature = "mock")]
pub mod mock {
    use super::*;

    /// Answers every request locally by echoing the user prompt.
    #[derive(Debug, Default, Clone)]
    pub struct MockEndpoint;

    impl MockEndpoint { pub fn new() -> Self { Self } }

    #[async_trait]
    impl ChatCompletionEndpoint for MockEndpoint {
        async fn complete(&self, request: &ChatCompletionRequest) -> Result<String> {
            Ok(request.user_prompt().unwrap_or_default().to_string())
        }
    }
}
