//! Retry loop.
//!
//! - [`controller`] - drives attempts and reports progress to a [`RunObserver`]
//! - [`state`] - run states, per-attempt records and the final result
//!
//! ```text
//! ┌──────┐   ┌────────────┐   ┌───────────┐   ┌─────────────┐
//! │ Idle │──>│ Generating │──>│ Executing │──>│ Classifying │──> Succeeded
//! └──────┘   └────────────┘   └───────────┘   └─────────────┘
//!                 ^  │                               │
//!                 │  └──> GenerationFailed           v
//!                 └────────────────────────── NextAttempt ──> Exhausted
//! ```

pub mod controller;
pub mod state;

pub use controller::{NoopObserver, RetryController, RunObserver, DEFAULT_MAX_ATTEMPTS};
pub use state::{AttemptRecord, RunOutcome, RunResult, RunState};
