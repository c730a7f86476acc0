//! Generation request assembly and rendering.

use crate::learning;
use crate::llm::{AttemptFocus, GenerationRequest};
use crate::r#loop::state::AttemptRecord;

use super::StrategyBand;

/// Assemble the request for `attempt` from everything tried so far.
///
/// The learning context and focus are only filled in once there is history.
/// Debugging-band requests restate the most recent diagnostic; recovery-band
/// requests replace it with a generic change-of-approach directive.
#[must_use]
pub fn build_request(task: &str, attempt: u32, history: &[AttemptRecord]) -> GenerationRequest {
    let band = StrategyBand::for_attempt(attempt);

    let (learning_context, focus) = if attempt > 1 && !history.is_empty() {
        let focus = if band.restates_last_failure() {
            history
                .last()
                .and_then(|r| r.diagnostic.clone())
                .map_or(AttemptFocus::None, AttemptFocus::LastDiagnostic)
        } else {
            AttemptFocus::DifferentApproach
        };
        (learning::build(history), focus)
    } else {
        (String::new(), AttemptFocus::None)
    };

    GenerationRequest {
        task: task.to_string(),
        attempt,
        band,
        learning_context,
        focus,
    }
}

/// Render a request as the user message sent to the model.
#[must_use]
pub fn render_user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!("Original Task: {}\n", request.task);

    if request.attempt > 1 {
        prompt.push_str(&request.learning_context);
        prompt.push_str(&format!("\n=== ATTEMPT {} FOCUS ===\n", request.attempt));

        match &request.focus {
            AttemptFocus::LastDiagnostic(diagnostic) => {
                prompt.push_str(&format!("Last error category: {}\n", diagnostic.category));
                prompt.push_str(&format!("Specific issue: {}\n", diagnostic.specific_issue));
                if let Some(line) = diagnostic.line_number {
                    prompt.push_str(&format!("Reported at line: {}\n", line));
                }
                prompt.push_str("Suggestions to fix:\n");
                for suggestion in &diagnostic.suggestions {
                    prompt.push_str(&format!("- {}\n", suggestion));
                }
            }
            AttemptFocus::DifferentApproach => {
                prompt.push_str("CRITICAL: Multiple failures detected. Consider:\n");
                prompt.push_str("- Completely different approach\n");
                prompt.push_str("- Simpler algorithm\n");
                prompt.push_str("- More basic implementation\n");
                prompt.push_str("- Extensive error handling\n");
            }
            AttemptFocus::None => {}
        }
    }

    prompt.push_str(&format!(
        "\nGenerate working Python code for attempt {}. Focus on CORRECTNESS over elegance.",
        request.attempt
    ));
    prompt
}
