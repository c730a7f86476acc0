//! raie - Self-Correcting Code Generation Loop
//!
//! Command-line front end: runs the retry loop against Mistral and prints
//! each attempt as it happens.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use raie::config::ConfigLoader;
use raie::r#loop::{AttemptRecord, RetryController, RunObserver, RunOutcome, RunResult};
use raie::{classify, MistralClient, RaieConfig, RaieError, Sandbox, SandboxRunner, StrategyBand};

#[derive(Parser)]
#[command(name = "raie")]
#[command(version)]
#[command(about = "Self-correcting Python code generation with learning from failures", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a working program for a task, retrying on failure
    Run {
        /// Natural-language description of the program
        task: String,

        /// Maximum attempts (1-10)
        #[arg(short, long, value_name = "N")]
        max_attempts: Option<u32>,

        /// Print the learning context before each retry
        #[arg(long, conflicts_with = "hide_learning")]
        show_learning: bool,

        /// Do not print the learning context
        #[arg(long)]
        hide_learning: bool,

        /// Write the final program to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print the run result as JSON instead of progress output
        #[arg(long)]
        json: bool,
    },

    /// Run a Python file through the sandbox and diagnose any failure
    Exec {
        /// Python source file
        file: PathBuf,
    },

    /// Classify Python error output (from a file or stdin) as JSON
    Classify {
        /// File containing stderr text; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Print the resolved configuration as JSON
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "raie=debug,info"
    } else {
        "raie=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = dispatch(cli).await {
        let code = err
            .downcast_ref::<RaieError>()
            .map_or(1, RaieError::exit_code);
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(code);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        anyhow::bail!(RaieError::config_with_path(
            format!("project directory does not exist: {}", project_path.display()),
            project_path,
        ));
    }

    // A project-local .env wins over one in the working directory; neither
    // overrides variables already set in the environment.
    dotenv::from_path(project_path.join(".env")).ok();
    dotenv::dotenv().ok();

    match cli.command {
        Commands::Run {
            task,
            max_attempts,
            show_learning,
            hide_learning,
            output,
            json,
        } => {
            let mut config = RaieConfig::load(&project_path)?;
            if let Some(max) = max_attempts {
                config = config.with_max_attempts(max);
            }
            if show_learning || hide_learning {
                config = config.with_show_learning(show_learning);
            }
            config.validate()?;

            run_task(&task, &config, output.as_deref(), json).await
        }

        Commands::Exec { file } => {
            let config = RaieConfig::load(&project_path)?;
            config.validate()?;
            exec_file(&file, &config).await
        }

        Commands::Classify { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read stdin")?;
                    buf
                }
            };
            let diagnostic = classify(&text);
            println!("{}", serde_json::to_string_pretty(&diagnostic)?);
            Ok(())
        }

        Commands::Config => {
            let (config, chain) = ConfigLoader::new().load_with_chain(&project_path)?;
            if cli.verbose {
                eprint!("{}", chain.describe());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_task(
    task: &str,
    config: &RaieConfig,
    output: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let generator = MistralClient::from_config(config.generator.clone()).map_err(RaieError::from)?;
    let sandbox = SandboxRunner::new(config.sandbox.clone());
    let observer = ConsoleObserver {
        show_learning: config.show_learning,
        quiet: json,
    };

    let controller =
        RetryController::new(Arc::new(generator), Arc::new(sandbox), config.max_attempts)
            .with_observer(Arc::new(observer));

    let token = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling after the current step...".yellow());
            token.cancel();
        }
    });

    if !json {
        println!("{} {}", "Task:".bold(), task);
    }

    let result = controller.run(task).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if let Some(path) = output {
        if result.final_code.is_empty() {
            eprintln!("{} no program to write", "Warning:".yellow());
        } else {
            std::fs::write(path, format!("{}\n", result.final_code))
                .with_context(|| format!("failed to write {}", path.display()))?;
            if !json {
                println!("{} {}", "Saved program to".green(), path.display());
            }
        }
    }

    result.ensure_success()?;
    Ok(())
}

async fn exec_file(file: &Path, config: &RaieConfig) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let runner = SandboxRunner::new(config.sandbox.clone());
    let outcome = runner.run(&code).await;

    if !outcome.stdout.is_empty() {
        println!("{}", "stdout:".bold());
        print!("{}", outcome.stdout);
    }
    if !outcome.stderr.is_empty() {
        println!("{}", "stderr:".bold());
        print!("{}", outcome.stderr.red());
        if !outcome.stderr.ends_with('\n') {
            println!();
        }
    }

    if outcome.succeeded {
        println!(
            "{} in {}ms",
            "Succeeded".green().bold(),
            outcome.duration.as_millis()
        );
        return Ok(());
    }

    println!("{}", "Failed".red().bold());
    if !outcome.stderr.is_empty() {
        let diagnostic = classify(&outcome.stderr);
        println!("{} {}", "Diagnosis:".bold(), diagnostic.summary());
        for suggestion in &diagnostic.suggestions {
            println!("  - {}", suggestion);
        }
    }
    std::process::exit(1);
}

fn print_result(result: &RunResult) {
    println!();
    match &result.outcome {
        RunOutcome::Succeeded => println!("{} {}", "✓".green().bold(), result.summary().green()),
        RunOutcome::Exhausted => println!("{} {}", "✗".red().bold(), result.summary().red()),
        RunOutcome::GenerationFailed { reason } => {
            println!("{} {}", "✗".red().bold(), reason.red())
        }
        RunOutcome::Cancelled => println!("{} {}", "!".yellow().bold(), result.summary().yellow()),
    }

    if !result.final_code.is_empty() {
        println!("\n{}", "Final program:".bold());
        println!("{}", result.final_code);
    }
}

/// Prints attempt progress to the terminal.
///
/// In quiet mode (JSON output) progress goes to stderr so stdout stays
/// machine-readable.
struct ConsoleObserver {
    show_learning: bool,
    quiet: bool,
}

impl ConsoleObserver {
    fn emit(&self, line: String) {
        if self.quiet {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn on_attempt_started(&self, attempt: u32, max_attempts: u32, band: StrategyBand) {
        self.emit(format!(
            "\n{} {}",
            format!("Attempt {}/{}", attempt, max_attempts).cyan().bold(),
            format!("({})", band).dimmed()
        ));
    }

    fn on_code_generated(&self, _attempt: u32, code: &str) {
        self.emit(format!(
            "  {} {} lines",
            "generated".dimmed(),
            code.lines().count()
        ));
    }

    fn on_attempt_finished(&self, record: &AttemptRecord) {
        if record.success {
            self.emit(format!(
                "  {} in {}ms",
                "✓ succeeded".green(),
                record.duration_ms
            ));
            if !record.stdout.trim().is_empty() {
                self.emit(format!("  {}", "output:".dimmed()));
                for line in record.stdout.lines() {
                    self.emit(format!("    {}", line));
                }
            }
            return;
        }

        if record.timed_out {
            self.emit(format!("  {} {}", "✗".red(), record.stderr.red()));
            return;
        }

        let detail = record
            .diagnostic
            .as_ref()
            .map_or_else(|| "exited with non-zero status".to_string(), |d| d.summary());
        self.emit(format!("  {} {}", "✗ failed".red(), detail));
    }

    fn on_learning_context(&self, _attempt: u32, text: &str) {
        if self.show_learning {
            for line in text.lines() {
                self.emit(format!("  {}", line.dimmed()));
            }
        }
    }
}
