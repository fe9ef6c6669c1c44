//! AnthropicBackend -- [`CompletionBackend`] over the Anthropic Messages API.
//!
//! Each call is one `POST /v1/messages` with the composed prompt as a single
//! user message. The API key is held as a [`SecretString`] and only exposed
//! when building the request headers.

use super::types::{ErrorResponse, MessagesRequest, MessagesResponse, RequestMessage};
use async_trait::async_trait;
use memvault_application::{CompletionBackend, CompletionError, CompletionOutput};
use memvault_domain::{CompletionMode, ProviderState};
use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Settings for [`AnthropicBackend`]
pub struct RemoteConfig {
    /// Key given directly; takes precedence over `api_key_env`
    pub api_key: Option<SecretString>,
    /// Environment variable consulted when no key is given
    pub api_key_env: String,
    pub base_url: String,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
        }
    }
}

impl RemoteConfig {
    /// The configured key, falling back to the environment variable.
    fn resolve_api_key(&self) -> Option<SecretString> {
        if let Some(key) = self
            .api_key
            .as_ref()
            .filter(|k| !k.expose_secret().is_empty())
        {
            return Some(SecretString::from(key.expose_secret().to_string()));
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from)
    }
}

// No Debug derive: keeps the key out of any formatted output.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    api_key_env: String,
    base_url: String,
    api_version: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicBackend {
    pub fn new(config: RemoteConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Other(format!("failed to create HTTP client: {e}")))?;
        let api_key = config.resolve_api_key();

        Ok(Self {
            client,
            api_key,
            api_key_env: config.api_key_env,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version,
            model: config.model,
            max_tokens: config.max_tokens,
            timeout: config.timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_status(status: reqwest::StatusCode, body: &str) -> CompletionError {
        let detail = serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.trim().to_string());

        let message = match status.as_u16() {
            401 => format!("authentication failed (HTTP 401): {detail}"),
            429 => format!("rate limited (HTTP 429): {detail}"),
            _ => format!("HTTP {status}: {detail}"),
        };
        CompletionError::RequestFailed(message)
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn mode(&self) -> CompletionMode {
        CompletionMode::Remote
    }

    async fn initialize(&self) -> Result<bool, CompletionError> {
        if self.api_key.is_none() {
            warn!(
                "No API key for the remote completion backend (set {})",
                self.api_key_env
            );
        }
        Ok(self.api_key.is_some())
    }

    async fn complete(&self, text: &str) -> Result<CompletionOutput, CompletionError> {
        let Some(api_key) = &self.api_key else {
            return Err(CompletionError::MissingCredential(self.api_key_env.clone()));
        };

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: text,
            }],
        };
        let url = self.url("/v1/messages");
        debug!("POST {} ({} bytes, model {})", url, text.len(), self.model);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout)
                } else {
                    CompletionError::RequestFailed(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, &error_body));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.timeout)
            } else {
                CompletionError::RequestFailed(format!("failed to parse response: {e}"))
            }
        })?;

        Ok(CompletionOutput {
            text: parsed.text(),
            latency: started.elapsed(),
        })
    }

    async fn shutdown(&self) -> Result<(), CompletionError> {
        Ok(())
    }

    fn state(&self) -> ProviderState {
        if self.api_key.is_some() {
            ProviderState::Ready
        } else {
            ProviderState::Stopped
        }
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
