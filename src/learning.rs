//! Cumulative learning context built from previous attempts.
//!
//! [`summarize`] folds an attempt history into a [`LearningSummary`]: failure
//! patterns grouped by category, success markers, and the strategy hints the
//! categories trigger. [`build`] renders that summary as the text block fed
//! into the next generation request.
//!
//! The summary is recomputed from the full history on every call, so its
//! output depends only on the records passed in. Only the last two
//! occurrences of a repeated category are rendered, which keeps the text size
//! flat as attempts accumulate.

use serde::Serialize;

use crate::classify::{Diagnostic, ErrorCategory};
use crate::r#loop::state::AttemptRecord;

/// Occurrences of a repeated category shown in the rendered text.
pub const REPEATED_TAIL: usize = 2;

/// One failed attempt within a pattern group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternOccurrence {
    pub attempt: u32,
    pub issue: String,
    pub suggestions: Vec<String>,
}

/// All failed attempts sharing a category, in attempt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternGroup {
    pub category: ErrorCategory,
    pub occurrences: Vec<PatternOccurrence>,
}

impl PatternGroup {
    /// Check if the category failed more than once.
    #[must_use]
    pub fn is_repeated(&self) -> bool {
        self.occurrences.len() > 1
    }

    /// The most recent occurrences, at most [`REPEATED_TAIL`].
    #[must_use]
    pub fn tail(&self) -> &[PatternOccurrence] {
        let start = self.occurrences.len().saturating_sub(REPEATED_TAIL);
        &self.occurrences[start..]
    }
}

/// Category-triggered advice, emitted at most once each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StrategyHint {
    StandardLibraryOnly,
    CheckSyntax,
    DefineBeforeUse,
    ValidateTypes,
}

impl StrategyHint {
    /// Hints in render order, with the category that triggers each.
    pub const ALL: [(ErrorCategory, StrategyHint); 4] = [
        (ErrorCategory::Import, StrategyHint::StandardLibraryOnly),
        (ErrorCategory::Syntax, StrategyHint::CheckSyntax),
        (ErrorCategory::Name, StrategyHint::DefineBeforeUse),
        (ErrorCategory::Type, StrategyHint::ValidateTypes),
    ];

    #[must_use]
    pub fn text(&self) -> &'static str {
        match self {
            Self::StandardLibraryOnly => {
                "Use only standard library imports (avoid external packages)"
            }
            Self::CheckSyntax => "Double-check syntax, especially brackets and indentation",
            Self::DefineBeforeUse => "Ensure all variables are defined before use",
            Self::ValidateTypes => "Add type checking and validation",
        }
    }
}

/// Machine-usable view of an attempt history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LearningSummary {
    /// Failure groups in order of each category's first appearance.
    pub patterns: Vec<PatternGroup>,
    /// Attempt numbers that succeeded.
    pub successes: Vec<u32>,
    /// Whether the history had any records at all.
    pub has_history: bool,
}

impl LearningSummary {
    /// Number of failed attempts in `category`.
    #[must_use]
    pub fn occurrences(&self, category: ErrorCategory) -> usize {
        self.patterns
            .iter()
            .find(|g| g.category == category)
            .map_or(0, |g| g.occurrences.len())
    }

    /// Check if any category failed more than once.
    #[must_use]
    pub fn has_repeated_failures(&self) -> bool {
        self.patterns.iter().any(PatternGroup::is_repeated)
    }

    /// Category with the most failures; earliest-seen wins ties.
    #[must_use]
    pub fn dominant_category(&self) -> Option<ErrorCategory> {
        let mut best: Option<&PatternGroup> = None;
        for group in &self.patterns {
            if best.is_none_or(|b| group.occurrences.len() > b.occurrences.len()) {
                best = Some(group);
            }
        }
        best.map(|g| g.category)
    }

    /// Strategy hints triggered by the categories present.
    #[must_use]
    pub fn hints(&self) -> Vec<StrategyHint> {
        StrategyHint::ALL
            .iter()
            .filter(|(category, _)| self.occurrences(*category) > 0)
            .map(|(_, hint)| *hint)
            .collect()
    }

    /// Render the summary as prompt text. Empty when there is no history.
    #[must_use]
    pub fn render(&self) -> String {
        if !self.has_history {
            return String::new();
        }

        let mut out = String::from("\n=== LEARNING FROM PREVIOUS ATTEMPTS ===\n");

        if !self.patterns.is_empty() {
            out.push_str("\nREPEATED ERROR PATTERNS DETECTED:\n");
            for group in self.patterns.iter().filter(|g| g.is_repeated()) {
                out.push_str(&format!(
                    "- {} errors occurred {} times\n",
                    group.category.label(),
                    group.occurrences.len()
                ));
                for occurrence in group.tail() {
                    out.push_str(&format!(
                        "  * Attempt {}: {}\n",
                        occurrence.attempt, occurrence.issue
                    ));
                    for suggestion in &occurrence.suggestions {
                        out.push_str(&format!("    - {}\n", suggestion));
                    }
                }
            }
        }

        if !self.successes.is_empty() {
            out.push_str("\nSUCCESSFUL ATTEMPTS:\n");
            for attempt in &self.successes {
                out.push_str(&format!("- Attempt {} succeeded\n", attempt));
            }
        }

        out.push_str("\nIMPROVEMENT STRATEGIES:\n");
        for hint in self.hints() {
            out.push_str(&format!("- {}\n", hint.text()));
        }

        out
    }
}

/// Summarize an attempt history.
#[must_use]
pub fn summarize(history: &[AttemptRecord]) -> LearningSummary {
    let mut summary = LearningSummary {
        has_history: !history.is_empty(),
        ..LearningSummary::default()
    };

    for record in history {
        if record.success {
            summary.successes.push(record.attempt_number);
            continue;
        }

        let fallback = Diagnostic::default();
        let diagnostic = record.diagnostic.as_ref().unwrap_or(&fallback);
        let occurrence = PatternOccurrence {
            attempt: record.attempt_number,
            issue: diagnostic.specific_issue.clone(),
            suggestions: diagnostic.suggestions.clone(),
        };

        match summary
            .patterns
            .iter_mut()
            .find(|g| g.category == diagnostic.category)
        {
            Some(group) => group.occurrences.push(occurrence),
            None => summary.patterns.push(PatternGroup {
                category: diagnostic.category,
                occurrences: vec![occurrence],
            }),
        }
    }

    summary
}

/// Build the learning-context text for an attempt history.
#[must_use]
pub fn build(history: &[AttemptRecord]) -> String {
    summarize(history).render()
}
