//! The generate-execute-classify retry loop.
//!
//! [`RetryController`] drives one run at a time: it asks the generator for a
//! program, runs it in the sandbox, classifies any failure, and feeds the
//! accumulated history back into the next request until an attempt succeeds,
//! the budget runs out, generation fails, or the run is cancelled.
//!
//! # Example
//!
//! ```rust,ignore
//! use raie::llm::MistralClient;
//! use raie::r#loop::RetryController;
//! use raie::sandbox::SandboxRunner;
//! use std::sync::Arc;
//!
//! let controller = RetryController::new(
//!     Arc::new(MistralClient::from_env()?),
//!     Arc::new(SandboxRunner::default()),
//!     5,
//! );
//! let result = controller.run("print the first 10 primes").await;
//! println!("{}", result.summary());
//! ```

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{AttemptRecord, RunOutcome, RunResult, RunState};
use crate::llm::{CodeGenerator, GenerationError};
use crate::prompt::{build_request, StrategyBand};
use crate::sandbox::Sandbox;

/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Reason reported when the backend answers without usable code.
pub const NO_CONTENT_REASON: &str = "Failed to generate code: backend returned no usable content";

/// Callbacks for presenting a run as it happens.
///
/// Every method has a no-op default, so implementors only override what they
/// display.
pub trait RunObserver: Send + Sync {
    fn on_state(&self, _state: RunState) {}

    fn on_attempt_started(&self, _attempt: u32, _max_attempts: u32, _band: StrategyBand) {}

    fn on_code_generated(&self, _attempt: u32, _code: &str) {}

    fn on_attempt_finished(&self, _record: &AttemptRecord) {}

    /// Called before generating attempt `attempt` whenever learning context
    /// was built for it.
    fn on_learning_context(&self, _attempt: u32, _text: &str) {}

    fn on_run_finished(&self, _result: &RunResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Orchestrates attempts for a task.
///
/// History lives only for the duration of [`run`](Self::run) and is frozen
/// into the returned [`RunResult`]; the controller can be reused for further
/// runs.
pub struct RetryController {
    generator: Arc<dyn CodeGenerator>,
    sandbox: Arc<dyn Sandbox>,
    max_attempts: u32,
    observer: Arc<dyn RunObserver>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("generator", &self.generator.model_name())
            .field("sandbox", &"<dyn Sandbox>")
            .field("max_attempts", &self.max_attempts)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RetryController {
    /// Create a controller. A budget of zero is treated as one attempt.
    #[must_use]
    pub fn new(
        generator: Arc<dyn CodeGenerator>,
        sandbox: Arc<dyn Sandbox>,
        max_attempts: u32,
    ) -> Self {
        Self {
            generator,
            sandbox,
            max_attempts: max_attempts.max(1),
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the current and future runs when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn enter(&self, state: RunState) {
        debug!(state = %state, "Run state changed");
        self.observer.on_state(state);
    }

    /// Run the loop for `task` until a terminal state is reached.
    ///
    /// Never fails: every way a run can end is described by the returned
    /// result's [`RunOutcome`].
    pub async fn run(&self, task: &str) -> RunResult {
        let started_at = Utc::now();
        let max = self.max_attempts;
        let mut records: Vec<AttemptRecord> = Vec::new();

        info!(
            model = %self.generator.model_name(),
            max_attempts = max,
            "Starting run"
        );
        self.enter(RunState::Idle);

        let outcome = self.attempt_loop(task, max, &mut records).await;

        self.enter(outcome.state());
        let result = RunResult::new(task, max, outcome, records, started_at);

        match &result.outcome {
            RunOutcome::Succeeded => info!(attempts = result.attempts_used, "Run succeeded"),
            RunOutcome::Exhausted => warn!(attempts = result.attempts_used, "Attempts exhausted"),
            RunOutcome::GenerationFailed { reason } => {
                warn!(attempts = result.attempts_used, reason = %reason, "Generation failed")
            }
            RunOutcome::Cancelled => info!(attempts = result.attempts_used, "Run cancelled"),
        }

        self.observer.on_run_finished(&result);
        result
    }

    async fn attempt_loop(
        &self,
        task: &str,
        max: u32,
        records: &mut Vec<AttemptRecord>,
    ) -> RunOutcome {
        for attempt in 1..=max {
            if self.cancel.is_cancelled() {
                return RunOutcome::Cancelled;
            }

            let request = build_request(task, attempt, records);
            if !request.learning_context.is_empty() {
                self.observer
                    .on_learning_context(attempt, &request.learning_context);
            }
            self.observer.on_attempt_started(attempt, max, request.band);
            info!(attempt, max_attempts = max, band = %request.band, "Starting attempt");

            self.enter(RunState::Generating);
            let generated = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RunOutcome::Cancelled,
                generated = self.generator.generate(&request) => generated,
            };

            let code = match generated {
                Ok(Some(code)) => code,
                Ok(None) => {
                    return RunOutcome::GenerationFailed {
                        reason: NO_CONTENT_REASON.to_string(),
                    }
                }
                Err(e) => {
                    return RunOutcome::GenerationFailed {
                        reason: backend_failure_reason(&e),
                    }
                }
            };
            self.observer.on_code_generated(attempt, &code);

            self.enter(RunState::Executing);
            let execution = self.sandbox.run(&code).await;

            self.enter(RunState::Classifying);
            let record = AttemptRecord::from_outcome(attempt, request.band, code, execution);
            if let Some(diagnostic) = &record.diagnostic {
                debug!(attempt, diagnostic = %diagnostic.summary(), "Attempt diagnosed");
            }
            self.observer.on_attempt_finished(&record);

            let success = record.success;
            records.push(record);

            if success {
                return RunOutcome::Succeeded;
            }
            if attempt < max {
                self.enter(RunState::NextAttempt);
            }
        }

        RunOutcome::Exhausted
    }
}

fn backend_failure_reason(err: &GenerationError) -> String {
    format!("Failed to generate code: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorCategory;
    use crate::llm::{AttemptFocus, MockCodeGenerator};
    use crate::testing::{fixtures, MockSandbox};
    use std::sync::Mutex;
    use std::time::Duration;

    fn controller(
        generator: &Arc<MockCodeGenerator>,
        sandbox: &Arc<MockSandbox>,
        max: u32,
    ) -> RetryController {
        RetryController::new(generator.clone(), sandbox.clone(), max)
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: Mutex<Vec<RunState>>,
        learning: Mutex<Vec<u32>>,
        finished: Mutex<u32>,
    }

    impl RunObserver for RecordingObserver {
        fn on_state(&self, state: RunState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_learning_context(&self, attempt: u32, _text: &str) {
            self.learning.lock().unwrap().push(attempt);
        }

        fn on_run_finished(&self, _result: &RunResult) {
            *self.finished.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_two_name_errors() {
        let generator = Arc::new(
            MockCodeGenerator::new()
                .with_code("print(resutl)")
                .with_code("print(resutl)")
                .with_code("print('ok')"),
        );
        let sandbox = Arc::new(
            MockSandbox::new()
                .with_failure(fixtures::NAME_ERROR)
                .with_failure(fixtures::NAME_ERROR)
                .with_success("ok\n"),
        );

        let result = controller(&generator, &sandbox, 3).run("print ok").await;

        assert_eq!(result.outcome, RunOutcome::Succeeded);
        assert!(result.succeeded);
        assert_eq!(result.attempts_used, 3);
        assert_eq!(result.final_code, "print('ok')");
        assert!(result.learning_applied);
        assert_eq!(result.records[2].band, StrategyBand::Debugging);
        assert_eq!(
            result.records[0].diagnostic.as_ref().unwrap().category,
            ErrorCategory::Name
        );

        let requests = generator.requests();
        assert!(requests[0].learning_context.is_empty());
        assert!(requests[2].learning_context.contains("NAME errors occurred 2 times"));
        assert!(matches!(requests[2].focus, AttemptFocus::LastDiagnostic(_)));
    }

    #[tokio::test]
    async fn test_first_attempt_success_stops_immediately() {
        let generator = Arc::new(MockCodeGenerator::new().with_code("print(1)"));
        let sandbox = Arc::new(MockSandbox::new().with_success("1\n"));

        let result = controller(&generator, &sandbox, 5).run("one").await;

        assert!(result.succeeded);
        assert_eq!(result.attempts_used, 1);
        assert!(!result.learning_applied);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_content_fails_without_running() {
        let generator = Arc::new(MockCodeGenerator::new().with_empty());
        let sandbox = Arc::new(MockSandbox::new().with_success(""));

        let result = controller(&generator, &sandbox, 3).run("task").await;

        assert_eq!(
            result.outcome,
            RunOutcome::GenerationFailed {
                reason: NO_CONTENT_REASON.to_string()
            }
        );
        assert_eq!(result.attempts_used, 0);
        assert!(result.records.is_empty());
        assert!(result.final_code.is_empty());
        assert_eq!(sandbox.run_count(), 0);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_error_reported_distinctly() {
        let generator = Arc::new(
            MockCodeGenerator::new()
                .with_code("import numpy")
                .with_error("connection refused"),
        );
        let sandbox = Arc::new(MockSandbox::new().with_failure(fixtures::MODULE_NOT_FOUND));

        let result = controller(&generator, &sandbox, 5).run("task").await;

        match &result.outcome {
            RunOutcome::GenerationFailed { reason } => {
                assert!(reason.contains("connection refused"));
                assert_ne!(reason, NO_CONTENT_REASON);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(result.attempts_used, 1);
        assert_eq!(result.final_code, "import numpy");
    }

    #[tokio::test]
    async fn test_all_attempts_fail_exhausts() {
        let generator = Arc::new(MockCodeGenerator::new().with_code("bad"));
        let sandbox = Arc::new(MockSandbox::new().with_failure(fixtures::SYNTAX_INVALID));

        let result = controller(&generator, &sandbox, 4).run("task").await;

        assert_eq!(result.outcome, RunOutcome::Exhausted);
        assert_eq!(result.attempts_used, 4);
        assert!(!result.succeeded);
        assert_eq!(sandbox.run_count(), 4);
        let numbers: Vec<_> = result.records.iter().map(|r| r.attempt_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_recovery_band_uses_generic_focus() {
        let generator = Arc::new(MockCodeGenerator::new().with_code("bad"));
        let sandbox = Arc::new(MockSandbox::new().with_failure(fixtures::TYPE_ERROR_ARGS));

        controller(&generator, &sandbox, 5).run("task").await;

        let requests = generator.requests();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[3].band, StrategyBand::Recovery);
        assert_eq!(requests[3].focus, AttemptFocus::DifferentApproach);
        assert_eq!(requests[4].focus, AttemptFocus::DifferentApproach);
    }

    #[tokio::test]
    async fn test_failure_without_stderr_continues() {
        let generator = Arc::new(MockCodeGenerator::new().with_code("exit(1)"));
        let sandbox = Arc::new(MockSandbox::new().with_failure(""));

        let result = controller(&generator, &sandbox, 2).run("task").await;

        assert_eq!(result.outcome, RunOutcome::Exhausted);
        assert!(result.records.iter().all(|r| r.diagnostic.is_none()));
        assert_eq!(generator.requests()[1].focus, AttemptFocus::None);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let generator = Arc::new(MockCodeGenerator::new().with_code("print(1)"));
        let sandbox = Arc::new(MockSandbox::new().with_success("1\n"));
        let controller = controller(&generator, &sandbox, 3);
        controller.cancellation_token().cancel();

        let result = controller.run("task").await;

        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert_eq!(result.attempts_used, 0);
        assert_eq!(generator.call_count(), 0);
        assert_eq!(result.ensure_success().unwrap_err().exit_code(), 130);
    }

    #[tokio::test]
    async fn test_cancel_during_generation() {
        let generator = Arc::new(
            MockCodeGenerator::new()
                .with_code("print(1)")
                .with_delay(Duration::from_secs(30)),
        );
        let sandbox = Arc::new(MockSandbox::new().with_success("1\n"));
        let token = CancellationToken::new();
        let controller = controller(&generator, &sandbox, 3).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), controller.run("task"))
            .await
            .expect("cancellation should end the run promptly");
        canceller.await.unwrap();

        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert_eq!(sandbox.run_count(), 0);
    }

    #[tokio::test]
    async fn test_observer_sees_states_and_learning() {
        let generator = Arc::new(MockCodeGenerator::new().with_code("x"));
        let sandbox = Arc::new(
            MockSandbox::new()
                .with_failure(fixtures::NAME_ERROR)
                .with_success(""),
        );
        let observer = Arc::new(RecordingObserver::default());

        controller(&generator, &sandbox, 3)
            .with_observer(observer.clone())
            .run("task")
            .await;

        let states = observer.states.lock().unwrap().clone();
        assert_eq!(states.first(), Some(&RunState::Idle));
        assert_eq!(states.last(), Some(&RunState::Succeeded));
        assert!(states.contains(&RunState::NextAttempt));
        assert_eq!(
            states.iter().filter(|s| **s == RunState::Executing).count(),
            2
        );
        assert_eq!(*observer.learning.lock().unwrap(), vec![2]);
        assert_eq!(*observer.finished.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_runs_once() {
        let generator = Arc::new(MockCodeGenerator::new().with_code("bad"));
        let sandbox = Arc::new(MockSandbox::new().with_failure("boom"));

        let result = controller(&generator, &sandbox, 0).run("task").await;

        assert_eq!(result.max_attempts, 1);
        assert_eq!(result.attempts_used, 1);
        assert_eq!(result.outcome, RunOutcome::Exhausted);
    }
}
