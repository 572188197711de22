//! Application configuration

pub mod prompts;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use prompts::PromptSettings;

/// Placeholder some setups leave in place of a real key
const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_CAPTURE_PROGRAM: &str = "/usr/sbin/screencapture";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Bearer token for the completion endpoint; `None` disables sending
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Where screenshots are written
    pub scratch_dir: PathBuf,
    pub capture_program: PathBuf,
    pub prompts_file: Option<PathBuf>,
    /// Extra location probed for the recorder binary, ahead of the defaults
    pub recorder_path: Option<PathBuf>,
    pub recorder_autostart: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            openai_api_key: None,
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            scratch_dir: env::temp_dir(),
            capture_program: PathBuf::from(DEFAULT_CAPTURE_PROGRAM),
            prompts_file: None,
            recorder_path: None,
            recorder_autostart: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            openai_api_key: normalize_api_key(env::var("OPENAI_API_KEY").ok()),
            api_url: env::var("BUDDY_API_URL").unwrap_or(defaults.api_url),
            model: env::var("BUDDY_MODEL").unwrap_or(defaults.model),
            max_tokens: env::var("BUDDY_MAX_TOKENS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.max_tokens),
            scratch_dir: env::var("BUDDY_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            capture_program: env::var("BUDDY_CAPTURE_PROGRAM")
                .map(PathBuf::from)
                .unwrap_or(defaults.capture_program),
            prompts_file: env::var("BUDDY_PROMPTS_FILE").ok().map(PathBuf::from),
            recorder_path: env::var("BUDDY_RECORDER_PATH").ok().map(PathBuf::from),
            recorder_autostart: env::var("BUDDY_RECORDER_AUTOSTART")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

/// Treat empty keys and the placeholder as "no credential"
fn normalize_api_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_api_key() {
        assert_eq!(normalize_api_key(None), None);
        assert_eq!(normalize_api_key(Some("".into())), None);
        assert_eq!(normalize_api_key(Some("   ".into())), None);
        assert_eq!(normalize_api_key(Some(PLACEHOLDER_API_KEY.into())), None);
        assert_eq!(
            normalize_api_key(Some(" sk-test ".into())),
            Some("sk-test".to_string())
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, 1000);
        assert!(config.openai_api_key.is_none());
        assert!(!config.recorder_autostart);
    }

    #[test]
    fn test_api_key_never_serialized() {
        let config = Config {
            openai_api_key: Some("sk-secret".into()),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
