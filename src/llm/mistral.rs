//! Mistral chat-completions backend.
//!
//! [`MistralClient`] implements [`CodeGenerator`] against the Mistral HTTP
//! API. Each request carries the band's system prompt and the rendered user
//! prompt, with a sampling temperature that narrows as attempts accumulate.
//! Markdown fences around the returned program are stripped before it is
//! handed back.
//!
//! # Example
//!
//! ```rust,ignore
//! use raie::llm::{MistralClient, MistralConfig};
//!
//! // Reads the key from MISTRAL_API_KEY
//! let client = MistralClient::from_config(MistralConfig::default())?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use crate::llm::{CodeGenerator, GenerationError, GenerationRequest};
use crate::prompt::{render_user_prompt, sampling_temperature};

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for [`MistralClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MistralConfig {
    pub model: String,
    /// Base URL; `/chat/completions` is appended.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl MistralConfig {
    pub const DEFAULT_MODEL: &'static str = "mistral-large-latest";
    pub const DEFAULT_API_BASE: &'static str = "https://api.mistral.ai/v1";
    pub const DEFAULT_API_KEY_ENV: &'static str = "MISTRAL_API_KEY";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_MAX_TOKENS: u32 = 1500;

    /// Set a custom API base URL (for proxies or local mocks).
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_api_key_env(mut self, env_var: &str) -> Self {
        self.api_key_env = env_var.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            api_key_env: Self::DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }
}

// =============================================================================
// API Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the Mistral chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct MistralClient {
    config: MistralConfig,
    api_key: String,
    http: reqwest::Client,
}

impl MistralClient {
    /// Create a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Connection`] if the HTTP client cannot be
    /// initialised.
    pub fn new(
        config: MistralConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            config,
            api_key: api_key.into(),
            http,
        })
    }

    /// Create a client reading the key from `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MissingApiKey`] if the variable is unset or
    /// blank.
    pub fn from_config(config: MistralConfig) -> Result<Self, GenerationError> {
        let api_key = env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;
        Self::new(config, api_key)
    }

    /// Create a client with default settings, key from `MISTRAL_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MissingApiKey`] if the key is not set.
    pub fn from_env() -> Result<Self, GenerationError> {
        Self::from_config(MistralConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &MistralConfig {
        &self.config
    }

    fn map_transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            GenerationError::Connection {
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl CodeGenerator for MistralClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        let system = request.band.system_prompt();
        let user = render_user_prompt(request);
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: sampling_temperature(request.attempt),
            max_tokens: self.config.max_tokens,
        };

        debug!(
            model = %self.config.model,
            attempt = request.attempt,
            band = %request.band,
            prompt_chars = user.len(),
            "Requesting code from Mistral"
        );

        let response = self
            .http
            .post(self.config.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Mistral request failed");
            return Err(GenerationError::from_status(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let code = clean_generated_code(&content);
        if code.is_empty() {
            debug!("Mistral returned no usable code");
            return Ok(None);
        }
        Ok(Some(code))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Strip markdown code fences and surrounding whitespace from model output.
///
/// Any line that starts with three backticks at column 0 is dropped,
/// whatever language tag follows it. Indented backticks are kept.
///
/// # Example
///
/// ```
/// use raie::llm::mistral::clean_generated_code;
///
/// let raw = "```python\nprint('hi')\n```\n";
/// assert_eq!(clean_generated_code(raw), "print('hi')");
/// ```
#[must_use]
pub fn clean_generated_code(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
