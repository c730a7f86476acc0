//! Run state types and transitions.
//!
//! This module defines the records produced by the retry loop: one
//! [`AttemptRecord`] per generate-execute-classify cycle and one
//! [`RunResult`] per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::Diagnostic;
use crate::error::RaieError;
use crate::prompt::StrategyBand;
use crate::sandbox::ExecutionOutcome;

/// Phase of the retry loop.
///
/// `Succeeded`, `Exhausted`, `GenerationFailed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Generating,
    Executing,
    Classifying,
    NextAttempt,
    Succeeded,
    Exhausted,
    GenerationFailed,
    Cancelled,
}

impl RunState {
    /// Check whether the loop stops in this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Exhausted | Self::GenerationFailed | Self::Cancelled
        )
    }

    /// Check whether an attempt is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Generating | Self::Executing | Self::Classifying | Self::NextAttempt
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Executing => "executing",
            Self::Classifying => "classifying",
            Self::NextAttempt => "next attempt",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::GenerationFailed => "generation failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// One generate-execute-classify cycle. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based, strictly increasing within a run.
    pub attempt_number: u32,
    /// Strategy band the code was generated under.
    pub band: StrategyBand,
    /// Whether the sandboxed run exited cleanly.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Program text that was executed.
    pub code: String,
    /// Present iff `stderr` is non-empty.
    pub diagnostic: Option<Diagnostic>,
    /// Whether the run hit the sandbox wall-clock limit.
    pub timed_out: bool,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    /// Build a record from a sandbox outcome, classifying non-empty stderr.
    #[must_use]
    pub fn from_outcome(
        attempt_number: u32,
        band: StrategyBand,
        code: impl Into<String>,
        outcome: ExecutionOutcome,
    ) -> Self {
        let diagnostic = if outcome.stderr.is_empty() {
            None
        } else {
            Some(crate::classify::classify(&outcome.stderr))
        };

        Self {
            attempt_number,
            band,
            success: outcome.succeeded,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            code: code.into(),
            diagnostic,
            timed_out: outcome.timed_out,
            duration_ms: outcome.duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// An attempt exited cleanly.
    Succeeded,
    /// Every attempt in the budget failed.
    Exhausted,
    /// The backend failed or returned nothing usable. Not retried.
    GenerationFailed { reason: String },
    /// Cancelled between attempts.
    Cancelled,
}

impl RunOutcome {
    /// The terminal [`RunState`] matching this outcome.
    #[must_use]
    pub fn state(&self) -> RunState {
        match self {
            Self::Succeeded => RunState::Succeeded,
            Self::Exhausted => RunState::Exhausted,
            Self::GenerationFailed { .. } => RunState::GenerationFailed,
            Self::Cancelled => RunState::Cancelled,
        }
    }
}

/// Frozen record of one complete run.
///
/// Owns its copy of the attempt history; nothing the controller does after
/// returning it can alter it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    /// Original natural-language task.
    pub prompt: String,
    /// Code from the last executed attempt, empty if none ran.
    pub final_code: String,
    pub attempts_used: u32,
    pub max_attempts: u32,
    pub succeeded: bool,
    /// True iff more than one attempt was needed.
    pub learning_applied: bool,
    pub outcome: RunOutcome,
    pub records: Vec<AttemptRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Fold a finished history into a result.
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        max_attempts: u32,
        outcome: RunOutcome,
        records: Vec<AttemptRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let attempts_used = records.len() as u32;
        let final_code = records
            .last()
            .map(|r| r.code.clone())
            .unwrap_or_default();

        Self {
            run_id: Uuid::new_v4(),
            prompt: prompt.into(),
            final_code,
            attempts_used,
            max_attempts,
            succeeded: outcome == RunOutcome::Succeeded,
            learning_applied: attempts_used > 1,
            outcome,
            records,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Fraction of attempts that exited cleanly, in `[0.0, 1.0]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let successes = self.records.iter().filter(|r| r.success).count();
        successes as f64 / self.records.len() as f64
    }

    /// Get a one-line summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} after {}/{} attempts ({:.1}% success rate)",
            self.outcome.state(),
            self.attempts_used,
            self.max_attempts,
            self.success_rate() * 100.0
        )
    }

    /// Convert a non-successful outcome into the matching error.
    ///
    /// # Errors
    ///
    /// Returns [`RaieError::GenerationFailed`], [`RaieError::AttemptsExhausted`]
    /// or [`RaieError::Cancelled`] unless the run succeeded.
    pub fn ensure_success(&self) -> crate::Result<()> {
        match &self.outcome {
            RunOutcome::Succeeded => Ok(()),
            RunOutcome::Exhausted => Err(RaieError::AttemptsExhausted {
                attempts: self.attempts_used,
            }),
            RunOutcome::GenerationFailed { reason } => Err(RaieError::GenerationFailed {
                reason: reason.clone(),
            }),
            RunOutcome::Cancelled => Err(RaieError::Cancelled {
                attempts: self.attempts_used,
            }),
        }
    }
}
