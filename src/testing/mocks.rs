//! Mock implementations of the execution seam.
//!
//! These mocks provide controllable test doubles for the sandbox, enabling
//! deterministic tests of the retry loop without spawning interpreters.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::sandbox::{ExecutionOutcome, Sandbox};

/// Mock sandbox replaying scripted outcomes.
///
/// Outcomes are returned in order; once the script runs out, the last one
/// repeats. Every program it is asked to run is recorded.
///
/// # Example
///
/// ```
/// use raie::testing::MockSandbox;
///
/// let sandbox = MockSandbox::new().with_success("ok\n");
/// assert_eq!(sandbox.run_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockSandbox {
    script: Mutex<VecDeque<ExecutionOutcome>>,
    last: Mutex<Option<ExecutionOutcome>>,
    programs: Mutex<Vec<String>>,
}

impl MockSandbox {
    /// Create a new mock with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a clean exit with the given stdout.
    #[must_use]
    pub fn with_success(self, stdout: &str) -> Self {
        self.push(ExecutionOutcome {
            succeeded: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
            timed_out: false,
            duration: Duration::from_millis(5),
        })
    }

    /// Queue a failed run with the given stderr.
    #[must_use]
    pub fn with_failure(self, stderr: &str) -> Self {
        self.push(ExecutionOutcome {
            succeeded: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
            timed_out: false,
            duration: Duration::from_millis(5),
        })
    }

    /// Queue a run that hit the time limit.
    #[must_use]
    pub fn with_timeout(self, limit: Duration) -> Self {
        self.push(ExecutionOutcome::timed_out(limit, limit))
    }

    fn push(self, outcome: ExecutionOutcome) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    /// Number of programs run so far.
    pub fn run_count(&self) -> usize {
        self.programs.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Every program run so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.programs.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn run(&self, code: &str) -> ExecutionOutcome {
        if let Ok(mut programs) = self.programs.lock() {
            programs.push(code.to_string());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(outcome) = next {
            *last = Some(outcome);
        }
        last.clone().unwrap_or_else(|| {
            ExecutionOutcome::launch_failure("mock sandbox has no scripted outcome", Duration::ZERO)
        })
    }
}
