//! Sandboxed execution of generated programs.
//!
//! Each run writes the program to a fresh, uniquely named temporary file,
//! executes it with the configured interpreter in a child process, and
//! removes the file afterwards. The child gets a hard wall-clock limit; when
//! it is exceeded the child is killed and its partial output discarded.
//!
//! Isolation is limited to the process boundary, the timeout, and a neutral
//! working directory. It is not a security boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use raie::sandbox::{Sandbox, SandboxConfig, SandboxRunner};
//!
//! let runner = SandboxRunner::new(SandboxConfig::default());
//! let outcome = runner.run("print('hello')").await;
//! assert!(outcome.succeeded);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default wall-clock limit for one program run.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default interpreter used to run generated programs.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Result of one sandboxed run. Always produced, whatever went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// True iff the child exited normally with status zero.
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ExecutionOutcome {
    /// The child could not be started (or its output could not be read).
    #[must_use]
    pub fn launch_failure(detail: impl std::fmt::Display, duration: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: format!("Execution error: {}", detail),
            timed_out: false,
            duration,
        }
    }

    /// The child exceeded `limit` and was killed.
    #[must_use]
    pub fn timed_out(limit: Duration, duration: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: timeout_message(limit),
            timed_out: true,
            duration,
        }
    }
}

/// Fixed stderr text reported for a run that hit `limit`.
#[must_use]
pub fn timeout_message(limit: Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("Code execution timed out (>{} seconds)", limit.as_secs())
    } else {
        format!(
            "Code execution timed out (>{:.1} seconds)",
            limit.as_secs_f64()
        )
    }
}

/// Something that can execute a program and report how it went.
///
/// Implementations never fail: every problem is folded into the returned
/// [`ExecutionOutcome`].
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(&self, code: &str) -> ExecutionOutcome;
}

/// Configuration for [`SandboxRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter name or path, resolved through `PATH`.
    pub interpreter: String,
    /// Wall-clock limit in seconds.
    pub timeout_secs: u64,
    /// Where program files are written. Defaults to the system temp dir.
    pub artifact_dir: Option<PathBuf>,
    /// Working directory of the child. Defaults to the system temp dir.
    pub working_dir: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            artifact_dir: None,
            working_dir: None,
        }
    }
}

impl SandboxConfig {
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.interpreter = interpreter.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Runs programs as child processes of the configured interpreter.
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    config: SandboxConfig,
    timeout: Duration,
}

impl SandboxRunner {
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        let timeout = config.timeout();
        Self { config, timeout }
    }

    /// Override the wall-clock limit with sub-second precision.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Write `code` to a fresh file. The file is deleted when the returned
    /// path is dropped.
    fn write_artifact(&self, code: &str) -> std::io::Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("raie-").suffix(".py");
        let mut file = match &self.config.artifact_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(code.as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    async fn execute(&self, artifact: &Path, started: Instant) -> ExecutionOutcome {
        let interpreter = match which::which(&self.config.interpreter) {
            Ok(path) => path,
            Err(e) => {
                return ExecutionOutcome::launch_failure(
                    format!("interpreter '{}' not found ({})", self.config.interpreter, e),
                    started.elapsed(),
                );
            }
        };

        let working_dir = self
            .config
            .working_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        let child = Command::new(&interpreter)
            .arg(artifact)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return ExecutionOutcome::launch_failure(e, started.elapsed()),
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ExecutionOutcome {
                succeeded: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                timed_out: false,
                duration: started.elapsed(),
            },
            Ok(Err(e)) => ExecutionOutcome::launch_failure(e, started.elapsed()),
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Program exceeded time limit, killed"
                );
                ExecutionOutcome::timed_out(self.timeout, started.elapsed())
            }
        }
    }
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[async_trait]
impl Sandbox for SandboxRunner {
    async fn run(&self, code: &str) -> ExecutionOutcome {
        let started = Instant::now();

        let artifact = match self.write_artifact(code) {
            Ok(path) => path,
            Err(e) => {
                return ExecutionOutcome::launch_failure(
                    format!("failed to write program file: {}", e),
                    started.elapsed(),
                );
            }
        };

        debug!(
            artifact = %artifact.display(),
            interpreter = %self.config.interpreter,
            "Running generated program"
        );

        let outcome = self.execute(&artifact, started).await;

        if let Err(e) = artifact.close() {
            warn!(error = %e, "Failed to remove program file");
        }

        debug!(
            succeeded = outcome.succeeded,
            timed_out = outcome.timed_out,
            duration_ms = outcome.duration.as_millis() as u64,
            "Program finished"
        );
        outcome
    }
}
