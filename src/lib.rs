//! raie - Self-Correcting Code Generation Loop
//!
//! Turns a natural-language task into a working Python program by repeatedly
//! generating code with a language model, running it in a sandbox, classifying
//! any failure, and feeding an accumulated learning context back into the next
//! request.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`classify`] - Python failure classification into structured diagnostics
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Custom error types and handling
//! - [`learning`] - Cumulative learning context from attempt history
//! - [`llm`] - Code-generation backends (Mistral, mock)
//! - [`r#loop`] - The retry controller and run records
//! - [`prompt`] - Strategy bands and prompt assembly
//! - [`sandbox`] - Time-limited execution of generated programs
//! - [`testing`] - Testing infrastructure (mocks, fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use raie::config::RaieConfig;
//! use raie::llm::MistralClient;
//! use raie::r#loop::RetryController;
//! use raie::sandbox::SandboxRunner;
//! use std::sync::Arc;
//!
//! let config = RaieConfig::load(".".as_ref())?;
//! let controller = RetryController::new(
//!     Arc::new(MistralClient::from_config(config.generator.clone())?),
//!     Arc::new(SandboxRunner::new(config.sandbox.clone())),
//!     config.max_attempts,
//! );
//!
//! let result = controller.run("print the first 10 primes").await;
//! result.ensure_success()?;
//! println!("{}", result.final_code);
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod learning;
pub mod llm;
pub mod r#loop;
pub mod prompt;
pub mod sandbox;
pub mod testing;

// Re-export commonly used types
pub use error::{RaieError, Result};

pub use classify::{classify, Diagnostic, ErrorCategory, ErrorClassifier};
pub use config::RaieConfig;
pub use learning::{LearningSummary, StrategyHint};
pub use llm::{CodeGenerator, GenerationError, GenerationRequest, MistralClient, MockCodeGenerator};
pub use prompt::StrategyBand;
pub use r#loop::{AttemptRecord, RetryController, RunObserver, RunOutcome, RunResult, RunState};
pub use sandbox::{ExecutionOutcome, Sandbox, SandboxConfig, SandboxRunner};
pub use testing::MockSandbox;
