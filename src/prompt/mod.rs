//! Prompt generation for code-generation requests.
//!
//! - [`StrategyBand`] - escalation tier chosen from the attempt number
//! - [`builder`] - assembles a [`GenerationRequest`](crate::llm::GenerationRequest)
//!   from the attempt history and renders it as the user prompt
//!
//! # Escalation
//!
//! ```text
//! attempt 1      attempts 2-3        attempts 4+
//! ┌──────────┐   ┌─────────────┐     ┌──────────────┐
//! │ Baseline │──>│  Debugging  │────>│   Recovery   │
//! └──────────┘   └─────────────┘     └──────────────┘
//! ```

pub mod builder;

pub use builder::{build_request, render_user_prompt};

use serde::{Deserialize, Serialize};

/// Escalation tier controlling how hard a request pushes for a new approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyBand {
    /// First attempt: plain instructions.
    Baseline,
    /// Attempts 2-3: analyze failures, program defensively.
    Debugging,
    /// Attempts 4+: rethink the approach, prefer simplicity.
    Recovery,
}

impl StrategyBand {
    /// Band for a 1-based attempt number.
    ///
    /// # Example
    ///
    /// ```
    /// use raie::prompt::StrategyBand;
    ///
    /// assert_eq!(StrategyBand::for_attempt(1), StrategyBand::Baseline);
    /// assert_eq!(StrategyBand::for_attempt(3), StrategyBand::Debugging);
    /// assert_eq!(StrategyBand::for_attempt(4), StrategyBand::Recovery);
    /// ```
    #[must_use]
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt {
            0 | 1 => Self::Baseline,
            2..=3 => Self::Debugging,
            _ => Self::Recovery,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Debugging => "debugging mode",
            Self::Recovery => "recovery mode",
        }
    }

    /// Whether requests in this band restate the last diagnostic.
    ///
    /// Recovery trusts the aggregate pattern summary over the single most
    /// recent failure.
    #[must_use]
    pub fn restates_last_failure(&self) -> bool {
        !matches!(self, Self::Recovery)
    }

    /// System instructions sent with every request in this band.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let rules = match self {
            Self::Baseline => BASELINE_RULES,
            Self::Debugging => DEBUGGING_RULES,
            Self::Recovery => RECOVERY_RULES,
        };
        format!("{}\n\n{}", SYSTEM_PREAMBLE, rules)
    }
}

impl std::fmt::Display for StrategyBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sampling temperature for an attempt; later attempts sample more narrowly.
#[must_use]
pub fn sampling_temperature(attempt: u32) -> f32 {
    (0.3 - attempt as f32 * 0.05).max(0.1)
}

const SYSTEM_PREAMBLE: &str = "You are an expert Python programmer with strong debugging skills.";

const BASELINE_RULES: &str = "\
Generate clean, working Python code for the user's request.

Rules:
1. Use only the Python standard library (no external packages)
2. Include all necessary imports
3. Add error handling and input validation
4. Comment the non-obvious logic
5. Trace through the code mentally before answering
6. Return ONLY executable Python code (no markdown formatting)";

const DEBUGGING_RULES: &str = "\
You are in DEBUGGING MODE. Previous attempts have failed.

Rules:
1. ANALYZE the previous failures before writing anything
2. Use ONLY Python standard library modules
3. Wrap risky operations in try/except blocks
4. Validate all inputs before processing
5. Program defensively and consider edge cases
6. Print progress where it helps diagnose failures
7. Return ONLY executable Python code (no markdown)

Focus on ROBUST, DEFENSIVE code.";

const RECOVERY_RULES: &str = "\
You are in RECOVERY MODE. Multiple attempts have failed.

Protocol:
1. If similar errors keep occurring, REWRITE the approach completely
2. Use the SIMPLEST solution that works
3. Split the problem into small functions that are easy to check
4. Use only built-in functions and the standard library
5. Consider a different algorithm altogether
6. Return ONLY executable Python code (no markdown)

PRIORITY: working code over elegant code.";
