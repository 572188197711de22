//! Chat completion provider

pub mod openai_compat;

#[cfg(test)]
pub(crate) mod mock_server;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API key is missing. Set the OPENAI_API_KEY environment variable.")]
    MissingCredential,

    #[error("Invalid API URL: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid response from server: {0}")]
    InvalidServerResponse(String),

    #[error("Server error: HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("No response from the model")]
    EmptyResponse,

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not read screenshot: {0}")]
    Attachment(#[from] std::io::Error),
}

/// Something that turns a user message (plus optional screenshot) into a reply
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, text: &str, image: Option<&Path>)
        -> Result<String, CompletionError>;
}
