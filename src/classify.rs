//! Failure classification for executed programs.
//!
//! Turns the raw stderr of a failed Python run into a structured
//! [`Diagnostic`]. Classification is an ordered decision list: each
//! signature pairs a set of trigger substrings with a category and an
//! extractor, and the first signature whose trigger appears in the text wins.
//!
//! # Example
//!
//! ```
//! use raie::classify::{classify, ErrorCategory};
//!
//! let diagnostic = classify("NameError: name 'total' is not defined");
//! assert_eq!(diagnostic.category, ErrorCategory::Name);
//! assert_eq!(diagnostic.specific_issue, "undefined_variable:total");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// Error Category
// ============================================================================

/// Category assigned to a failure. Exactly one per diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Import,
    Name,
    Type,
    Index,
    Key,
    Indentation,
    /// No known signature matched.
    #[default]
    Unknown,
}

impl ErrorCategory {
    /// Lowercase identifier, as used in prompts and JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Import => "import",
            Self::Name => "name",
            Self::Type => "type",
            Self::Index => "index",
            Self::Key => "key",
            Self::Indentation => "indentation",
            Self::Unknown => "unknown",
        }
    }

    /// Uppercase label used in learning summaries.
    #[must_use]
    pub fn label(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Diagnostic
// ============================================================================

/// Structured classification of one failure's stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Failure category.
    pub category: ErrorCategory,
    /// Short machine-readable tag such as `invalid_syntax`, or empty.
    pub specific_issue: String,
    /// Source line implicated by the failure, if one was reported.
    ///
    /// Values of 0 or above `u32::MAX` are not real source lines and are
    /// reported as `None`.
    pub line_number: Option<u32>,
    /// Modules the program tried to import but could not.
    pub missing_imports: Vec<String>,
    /// Remediation hints in the order they were produced.
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Whether a known failure signature matched.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        self.category != ErrorCategory::Unknown
    }

    /// One-line summary suitable for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("[{}]", self.category)];
        if !self.specific_issue.is_empty() {
            parts.push(self.specific_issue.clone());
        }
        if !self.missing_imports.is_empty() {
            parts.push(format!("missing: {}", self.missing_imports.join(", ")));
        }
        if let Some(line) = self.line_number {
            parts.push(format!("at line {}", line));
        }
        parts.join(" ")
    }

    fn set_issue(&mut self, issue: impl Into<String>, suggestion: impl Into<String>) {
        self.specific_issue = issue.into();
        self.suggestions.push(suggestion.into());
    }
}

// ============================================================================
// Signature Table
// ============================================================================

/// Extracts category-specific detail into a diagnostic.
///
/// Receives the original text and its lowercased form.
type Extractor = fn(&Patterns, &str, &str, &mut Diagnostic);

/// One row of the ordered decision list.
struct Signature {
    /// Case-insensitive substrings; any one of them triggers the row.
    triggers: &'static [&'static str],
    category: ErrorCategory,
    extract: Extractor,
}

/// Evaluated top to bottom, first match wins.
const SIGNATURES: &[Signature] = &[
    Signature {
        triggers: &["syntaxerror"],
        category: ErrorCategory::Syntax,
        extract: extract_syntax,
    },
    Signature {
        triggers: &["modulenotfounderror", "importerror", "no module named"],
        category: ErrorCategory::Import,
        extract: extract_import,
    },
    Signature {
        triggers: &["nameerror"],
        category: ErrorCategory::Name,
        extract: extract_name,
    },
    Signature {
        triggers: &["typeerror"],
        category: ErrorCategory::Type,
        extract: extract_type,
    },
    Signature {
        triggers: &["indexerror"],
        category: ErrorCategory::Index,
        extract: extract_index,
    },
    Signature {
        triggers: &["keyerror"],
        category: ErrorCategory::Key,
        extract: extract_key,
    },
    Signature {
        triggers: &["indentationerror"],
        category: ErrorCategory::Indentation,
        extract: extract_indentation,
    },
];

/// Compiled extraction patterns.
struct Patterns {
    missing_module: Option<Regex>,
    undefined_name: Option<Regex>,
    line_number: Option<Regex>,
}

impl Patterns {
    fn new() -> Self {
        Self {
            missing_module: Regex::new(r"(?i)no module named '([^']+)'").ok(),
            undefined_name: Regex::new(r"(?i)name '([^']+)' is not defined").ok(),
            line_number: Regex::new(r"line (\d+)").ok(),
        }
    }
}

/// First capture group of `re` in `text`.
fn capture<'t>(re: Option<&Regex>, text: &'t str) -> Option<&'t str> {
    re?.captures(text)?.get(1).map(|m| m.as_str())
}

fn extract_syntax(_: &Patterns, _: &str, lower: &str, d: &mut Diagnostic) {
    if lower.contains("invalid syntax") {
        d.set_issue(
            "invalid_syntax",
            "Check parentheses, brackets, and indentation",
        );
    } else if lower.contains("unexpected eof") {
        d.set_issue(
            "unexpected_eof",
            "Missing closing brackets or incomplete statements",
        );
    } else {
        d.suggestions
            .push("Review the reported statement for typos or unbalanced delimiters".to_string());
    }
}

fn extract_import(p: &Patterns, text: &str, _: &str, d: &mut Diagnostic) {
    match capture(p.missing_module.as_ref(), text) {
        Some(module) => {
            let module = module.to_string();
            d.suggestions.push(format!(
                "Add import for {} or use standard library alternative",
                module
            ));
            d.missing_imports.push(module);
        }
        None => d
            .suggestions
            .push("Import only names that exist in the standard library".to_string()),
    }
}

fn extract_name(p: &Patterns, text: &str, _: &str, d: &mut Diagnostic) {
    match capture(p.undefined_name.as_ref(), text) {
        Some(name) => {
            d.set_issue(
                format!("undefined_variable:{}", name),
                format!("Define variable '{}' before using it", name),
            );
        }
        None => d
            .suggestions
            .push("Define every name before it is used".to_string()),
    }
}

fn extract_type(_: &Patterns, _: &str, lower: &str, d: &mut Diagnostic) {
    if lower.contains("takes") && lower.contains("positional argument") {
        d.set_issue(
            "wrong_arguments",
            "Check function arguments and their count",
        );
    } else if lower.contains("unsupported operand") {
        d.set_issue("incompatible_types", "Check data types in operations");
    } else {
        d.suggestions
            .push("Check the types of values passed to functions and operators".to_string());
    }
}

fn extract_index(_: &Patterns, _: &str, _: &str, d: &mut Diagnostic) {
    d.suggestions
        .push("Check list/array bounds before accessing".to_string());
}

fn extract_key(_: &Patterns, _: &str, _: &str, d: &mut Diagnostic) {
    d.suggestions
        .push("Check if dictionary key exists before accessing".to_string());
}

fn extract_indentation(_: &Patterns, _: &str, _: &str, d: &mut Diagnostic) {
    d.suggestions
        .push("Fix indentation - use consistent spaces or tabs".to_string());
}

// ============================================================================
// Classifier
// ============================================================================

/// Classifies Python failure output.
///
/// Construction compiles the extraction regexes; classification itself is
/// pure. Prefer the shared instance behind [`classify`].
pub struct ErrorClassifier {
    patterns: Patterns,
}

impl ErrorClassifier {
    /// Create a new classifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: Patterns::new(),
        }
    }

    /// Classify stderr text. Total: every input yields a diagnostic.
    #[must_use]
    pub fn classify(&self, stderr: &str) -> Diagnostic {
        let mut diagnostic = Diagnostic::default();
        if stderr.is_empty() {
            return diagnostic;
        }

        let lower = stderr.to_lowercase();

        if let Some(signature) = SIGNATURES
            .iter()
            .find(|sig| sig.triggers.iter().any(|t| lower.contains(t)))
        {
            diagnostic.category = signature.category;
            (signature.extract)(&self.patterns, stderr, &lower, &mut diagnostic);
        }

        diagnostic.line_number = capture(self.patterns.line_number.as_ref(), stderr)
            .and_then(|line| line.parse::<u32>().ok())
            .filter(|&line| line > 0);

        diagnostic
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify stderr text with a process-wide classifier.
#[must_use]
pub fn classify(stderr: &str) -> Diagnostic {
    static CLASSIFIER: OnceLock<ErrorClassifier> = OnceLock::new();
    CLASSIFIER.get_or_init(ErrorClassifier::new).classify(stderr)
}
