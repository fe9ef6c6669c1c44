//! Remote API configuration from TOML (`[anthropic]` section)

use crate::remote::RemoteConfig;
use crate::remote::anthropic::{
    DEFAULT_API_KEY_ENV, DEFAULT_API_VERSION, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAnthropicConfig {
    /// Environment variable name for the API key (default: "ANTHROPIC_API_KEY").
    pub api_key_env: String,
    /// Direct API key (not recommended, use the env var instead).
    pub api_key: Option<String>,
    /// Base URL for the Anthropic API.
    pub base_url: String,
    /// Anthropic API version header.
    pub api_version: String,
    /// Model requested for every completion.
    pub model: String,
    /// Max tokens per response.
    pub max_tokens: u32,
}

impl Default for FileAnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl FileAnthropicConfig {
    /// Build backend settings; requests time out after `timeout`.
    pub fn to_remote_config(&self, timeout: Duration) -> RemoteConfig {
        RemoteConfig {
            api_key: self.api_key.clone().map(SecretString::from),
            api_key_env: self.api_key_env.clone(),
            base_url: self.base_url.clone(),
            api_version: self.api_version.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout,
        }
    }
}
