//! Prompt settings
//!
//! The system instructions sent ahead of every message, plus a set of
//! default text blocks ("snippets") the UI can offer for quick insertion.
//! Both can be overridden from a TOML file.
//!
//! # Example Settings File
//!
//! ```toml
//! [system_prompt]
//! content = """
//! You are a pair programmer looking over my shoulder...
//! """
//!
//! [[snippets]]
//! name = "explain"
//! content = "Explain what is on my screen."
//!
//! [[snippets]]
//! name = "review"
//! content = "Review the code that is currently visible."
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Prompt configuration for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    /// The system prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: SystemPrompt,

    /// Default text blocks
    #[serde(default)]
    pub snippets: Vec<Snippet>,
}

/// System prompt content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub content: String,
}

/// A named block of text the user can drop into the input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub name: String,
    pub content: String,
}

fn default_system_prompt() -> SystemPrompt {
    SystemPrompt {
        content: builtin::SYSTEM.to_string(),
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptSettings {
    /// Built-in settings that don't require a file
    pub fn builtin() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            snippets: Vec::new(),
        }
    }

    /// Load settings from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, PromptError> {
        let settings: PromptSettings =
            toml::from_str(content).map_err(|e| PromptError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), PromptError> {
        if self.system_prompt.content.trim().is_empty() {
            return Err(PromptError::Invalid(
                "system prompt content is empty".to_string(),
            ));
        }
        if let Some(blank) = self.snippets.iter().find(|s| s.name.trim().is_empty()) {
            return Err(PromptError::Invalid(format!(
                "snippet with content {:?} has no name",
                blank.content
            )));
        }
        Ok(())
    }

    /// The system prompt text
    pub fn system(&self) -> &str {
        &self.system_prompt.content
    }

    /// Look up a snippet by name (case-insensitive)
    pub fn snippet(&self, name: &str) -> Option<&Snippet> {
        self.snippets
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Errors from prompt loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid prompt settings: {0}")]
    Invalid(String),
}

/// Built-in prompts
pub mod builtin {
    /// Default instructions for screenshot-aware chat
    pub const SYSTEM: &str = "You are a helpful AI assistant. When provided with screenshots, analyze and describe what you see in the image along with responding to the user's message.";
}
