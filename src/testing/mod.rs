//! Testing infrastructure for raie.
//!
//! - **Mocks**: test doubles for the sandbox with scripted outcomes
//! - **Fixtures**: captured Python tracebacks (test-only)
//!
//! The generator double lives next to its trait, in
//! [`crate::llm::MockCodeGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use raie::testing::MockSandbox;
//!
//! let sandbox = MockSandbox::new()
//!     .with_failure("NameError: name 'x' is not defined")
//!     .with_success("42\n");
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod mocks;

pub use mocks::*;
