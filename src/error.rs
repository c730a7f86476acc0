//! Custom error types for raie.
//!
//! Only configuration problems and terminal run outcomes surface as errors.
//! Failures of generated programs are data (see [`crate::classify`]), never
//! errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::llm::GenerationError;

/// Main error type for raie operations
#[derive(Error, Debug)]
pub enum RaieError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Run Outcomes
    // =========================================================================
    /// The generation backend failed or produced nothing usable
    #[error("Code generation failed: {reason}")]
    GenerationFailed { reason: String },

    /// Every attempt in the budget failed
    #[error("No working program after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    /// The run was cancelled between attempts
    #[error("Run cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// Generation backend error wrapper
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RaieError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::GenerationFailed { .. } | Self::Generation(_) => 3,
            Self::AttemptsExhausted { .. } => 4,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            Self::Cancelled { .. } => 130,
            _ => 1,
        }
    }
}

/// Type alias for raie results
pub type Result<T> = std::result::Result<T, RaieError>;
