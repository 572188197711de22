//! OpenAI-compatible completion client
//!
//! Sends one user message, optionally with a screenshot inlined as a
//! base64 data URI, to a chat completions endpoint and returns the first
//! choice's text. One request, one response: no streaming, no retries.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "model": "gpt-4o",
//!   "messages": [
//!     {"role": "system", "content": [{"type": "text", "text": "..."}]},
//!     {"role": "user", "content": [
//!       {"type": "text", "text": "What is this error?"},
//!       {"type": "image_url", "image_url": {"url": "data:image/png;base64,..."}}
//!     ]}
//!   ],
//!   "max_tokens": 1000
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::{Config, PromptSettings};

use super::{CompletionBackend, CompletionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Inline PNG bytes as a data URI. The media type is always png.
    pub fn png(bytes: &[u8]) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/png;base64,{}", STANDARD.encode(bytes)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub content: String,
}

/// Provider configuration
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    /// Full URL of the chat completions endpoint
    pub endpoint: String,
    /// Bearer token; `None` means every call fails with `MissingCredential`
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl OpenAICompatConfig {
    pub fn from_config(config: &Config, prompts: &PromptSettings) -> Self {
        Self {
            endpoint: config.api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: prompts.system().to_string(),
        }
    }
}

/// OpenAI-compatible API provider
pub struct OpenAICompatProvider {
    config: OpenAICompatConfig,
    client: Client,
}

impl OpenAICompatProvider {
    pub fn new(config: OpenAICompatConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Build the request body: fixed system block first, then the user's
    /// text with the image (if any) after it.
    pub fn build_request(&self, text: &str, image_png: Option<&[u8]>) -> CompletionRequest {
        let mut content = vec![ContentBlock::text(text)];
        if let Some(bytes) = image_png {
            content.push(ContentBlock::png(bytes));
        }

        CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: vec![ContentBlock::text(&self.config.system_prompt)],
                },
                ChatMessage {
                    role: Role::User,
                    content,
                },
            ],
            max_tokens: self.config.max_tokens,
        }
    }

    fn endpoint(&self) -> Result<Url, CompletionError> {
        let url = Url::parse(&self.config.endpoint)
            .map_err(|_| CompletionError::InvalidEndpoint(self.config.endpoint.clone()))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(CompletionError::InvalidEndpoint(self.config.endpoint.clone())),
        }
    }

    /// Send a message and return the assistant's reply
    pub async fn chat(&self, text: &str, image: Option<&Path>) -> Result<String, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;

        let url = self.endpoint()?;

        let image_bytes = match image {
            Some(path) => Some(tokio::fs::read(path).await?),
            None => None,
        };

        let request = self.build_request(text, image_bytes.as_deref());

        tracing::debug!(
            model = %request.model,
            with_image = image_bytes.is_some(),
            "sending completion request"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(CompletionError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::InvalidServerResponse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse)?;

        Ok(choice.message.content)
    }
}

#[async_trait]
impl CompletionBackend for OpenAICompatProvider {
    async fn complete(
        &self,
        text: &str,
        image: Option<&Path>,
    ) -> Result<String, CompletionError> {
        self.chat(text, image).await
    }
}
