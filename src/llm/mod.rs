//! Code-generation backend abstraction.
//!
//! The retry loop talks to its backend only through [`CodeGenerator`]. A
//! backend either returns program text, returns `Ok(None)` when it answered
//! but produced nothing usable, or fails with a [`GenerationError`]. Both
//! non-text cases end the run; they are kept apart so the caller can report
//! them differently.
//!
//! # Example
//!
//! ```rust,ignore
//! use raie::llm::{CodeGenerator, MistralClient};
//! use raie::prompt::build_request;
//!
//! let client = MistralClient::from_env()?;
//! let request = build_request("print the first 10 primes", 1, &[]);
//! let code = client.generate(&request).await?;
//! ```

pub mod mistral;

pub use mistral::{MistralClient, MistralConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::classify::Diagnostic;
use crate::prompt::StrategyBand;

/// What the next attempt should concentrate on, beyond the learning context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFocus {
    /// First attempt, or the last failure left no diagnostic.
    None,
    /// Restate the most recent failure's diagnostic.
    LastDiagnostic(Diagnostic),
    /// Stop patching and try something different.
    DifferentApproach,
}

/// Everything a backend needs to produce one candidate program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Original natural-language task.
    pub task: String,
    /// 1-based attempt number.
    pub attempt: u32,
    pub band: StrategyBand,
    /// Rendered learning context; empty on the first attempt.
    pub learning_context: String,
    pub focus: AttemptFocus,
}

/// Errors raised by a generation backend.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// API key not found in environment.
    #[error("API key not found in environment variable '{env_var}'")]
    MissingApiKey { env_var: String },

    /// Authentication failed - check API key.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimited { message: String },

    /// Invalid request - check prompt/parameters.
    #[error("Invalid request (HTTP {status}): {message}")]
    InvalidRequest { status: u16, message: String },

    /// Server error - may be transient.
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Network/connection error.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Timeout waiting for response.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Response body could not be decoded.
    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },
}

impl GenerationError {
    /// Map a non-success HTTP status and body to an error.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = body.trim().to_string();
        match status {
            401 | 403 => Self::AuthenticationFailed { message },
            429 => Self::RateLimited { message },
            500..=599 => Self::ServerError { status, message },
            _ => Self::InvalidRequest { status, message },
        }
    }
}

/// A source of candidate programs.
///
/// Implementations must bound their own request time; the loop waits on
/// [`generate`](CodeGenerator::generate) without a timeout of its own.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce program text for `request`.
    ///
    /// Returns `Ok(None)` when the backend answered without usable code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, rejects the request,
    /// or answers with something that cannot be decoded.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError>;

    /// Human-readable backend/model identifier.
    fn model_name(&self) -> &str;
}

/// Canned response for [`MockCodeGenerator`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Code(String),
    Empty,
    Error(String),
}

/// Mock generator for testing.
///
/// Replays scripted replies in order and records every request it receives.
/// Once the script runs out, the last reply repeats.
///
/// # Example
///
/// ```
/// use raie::llm::MockCodeGenerator;
///
/// let generator = MockCodeGenerator::new()
///     .with_code("print(undefined)")
///     .with_code("print('ok')");
/// assert_eq!(generator.call_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockCodeGenerator {
    script: Mutex<VecDeque<MockReply>>,
    last: Mutex<Option<MockReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
}

impl MockCodeGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply with program text.
    #[must_use]
    pub fn with_code(self, code: &str) -> Self {
        self.push(MockReply::Code(code.to_string()))
    }

    /// Queue a reply with no usable content.
    #[must_use]
    pub fn with_empty(self) -> Self {
        self.push(MockReply::Empty)
    }

    /// Queue a backend failure.
    #[must_use]
    pub fn with_error(self, message: &str) -> Self {
        self.push(MockReply::Error(message.to_string()))
    }

    /// Sleep before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, reply: MockReply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
        self
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Copies of every request received, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone().unwrap_or(MockReply::Empty)
    }
}

#[async_trait]
impl CodeGenerator for MockCodeGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply() {
            MockReply::Code(code) => Ok(Some(code)),
            MockReply::Empty => Ok(None),
            MockReply::Error(message) => Err(GenerationError::Connection { message }),
        }
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}
