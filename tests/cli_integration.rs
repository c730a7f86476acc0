//! CLI integration tests for the raie binary.

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NAME_ERROR: &str = "Traceback (most recent call last):
  File \"/tmp/raie-c71d.py\", line 7, in <module>
    print(resutl)
NameError: name 'resutl' is not defined
";

/// Get a Command for the raie binary, isolated from the user's config dir.
fn raie(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("raie"));
    cmd.current_dir(home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env("CLICOLOR", "0")
        .env_remove("MISTRAL_API_KEY");
    cmd
}

fn write_settings(project: &TempDir, json: &str) {
    let dir = project.path().join(".raie");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("settings.json"), json).unwrap();
}

fn has_python() -> bool {
    which::which("python3").is_ok()
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

// ============================================================
// Basic Commands
// ============================================================

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    raie(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("exec"));
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    raie(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("raie"));
}

// ============================================================
// classify
// ============================================================

#[test]
fn test_classify_from_stdin() {
    let home = TempDir::new().unwrap();
    let output = raie(&home)
        .arg("classify")
        .write_stdin(NAME_ERROR)
        .output()
        .unwrap();

    assert!(output.status.success());
    let diagnostic: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(diagnostic["category"], "name");
    assert_eq!(diagnostic["specific_issue"], "undefined_variable:resutl");
    assert_eq!(diagnostic["line_number"], 7);
}

#[test]
fn test_classify_from_file() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("stderr.txt");
    std::fs::write(&file, "ModuleNotFoundError: No module named 'numpy'\n").unwrap();

    raie(&home)
        .arg("classify")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"import\""))
        .stdout(predicate::str::contains("numpy"));
}

#[test]
fn test_classify_unrecognized_text() {
    let home = TempDir::new().unwrap();
    raie(&home)
        .arg("classify")
        .write_stdin("something odd happened")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"unknown\""));
}

#[test]
fn test_classify_missing_file() {
    let home = TempDir::new().unwrap();
    raie(&home)
        .args(["classify", "/nonexistent/stderr.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ============================================================
// config
// ============================================================

#[test]
fn test_config_defaults() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    let output = raie(&home)
        .arg("config")
        .arg("--project")
        .arg(project.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["max_attempts"], 5);
    assert_eq!(config["sandbox"]["timeout_secs"], 15);
    assert_eq!(config["generator"]["model"], "mistral-large-latest");
}

#[test]
fn test_config_project_override() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write_settings(&project, r#"{"max_attempts": 3, "sandbox": {"timeout_secs": 4}}"#);

    raie(&home)
        .arg("config")
        .arg("--project")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_attempts\": 3"))
        .stdout(predicate::str::contains("\"timeout_secs\": 4"));
}

#[test]
fn test_config_invalid_json_exits_with_config_code() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write_settings(&project, "{ broken");

    raie(&home)
        .arg("config")
        .arg("--project")
        .arg(project.path())
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Configuration error"));
}

// ============================================================
// run
// ============================================================

#[test]
fn test_run_rejects_out_of_range_attempts() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    raie(&home)
        .args(["run", "print hello", "--max-attempts", "11"])
        .arg("--project")
        .arg(project.path())
        .assert()
        .code(7)
        .stderr(predicate::str::contains("max_attempts"));
}

#[test]
fn test_run_without_api_key() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    raie(&home)
        .args(["run", "print hello"])
        .arg("--project")
        .arg(project.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("MISTRAL_API_KEY"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_reads_api_key_from_project_dotenv() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-from-dotenv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("")))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write_settings(
        &project,
        &format!(r#"{{"generator": {{"api_base": "{}/v1"}}}}"#, server.uri()),
    );
    std::fs::write(
        project.path().join(".env"),
        "MISTRAL_API_KEY=sk-from-dotenv\n",
    )
    .unwrap();

    let output = raie(&home)
        .args(["run", "print hi", "--json"])
        .arg("--project")
        .arg(project.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reason = result["outcome"]["reason"].as_str().unwrap();
    assert!(reason.contains("no usable content"), "{reason}");
}

#[test]
fn test_run_learning_flags_conflict() {
    let home = TempDir::new().unwrap();
    raie(&home)
        .args(["run", "x", "--show-learning", "--hide-learning"])
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_with_empty_generation_reports_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("")))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write_settings(
        &project,
        &format!(r#"{{"generator": {{"api_base": "{}/v1"}}}}"#, server.uri()),
    );

    let output = raie(&home)
        .env("MISTRAL_API_KEY", "test-key")
        .args(["run", "print hello", "--json"])
        .arg("--project")
        .arg(project.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["outcome"]["status"], "generation_failed");
    assert_eq!(result["attempts_used"], 0);
    assert_eq!(result["succeeded"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_writes_final_program() {
    if !has_python() {
        eprintln!("skipping: no python3 on PATH");
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("```python\nprint('hello from raie')\n```")),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write_settings(
        &project,
        &format!(r#"{{"generator": {{"api_base": "{}/v1"}}}}"#, server.uri()),
    );
    let out_file = project.path().join("generated.py");

    raie(&home)
        .env("MISTRAL_API_KEY", "test-key")
        .args(["run", "print a greeting"])
        .arg("--project")
        .arg(project.path())
        .arg("--output")
        .arg(&out_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Attempt 1/5"))
        .stdout(predicate::str::contains("hello from raie"));

    let saved = std::fs::read_to_string(&out_file).unwrap();
    assert_eq!(saved, "print('hello from raie')\n");
}

// ============================================================
// exec
// ============================================================

#[test]
fn test_exec_missing_file() {
    let home = TempDir::new().unwrap();
    raie(&home)
        .args(["exec", "/nonexistent/program.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_exec_failing_program_is_diagnosed() {
    if !has_python() {
        return;
    }
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.py");
    std::fs::write(&file, "print(undefined_name)\n").unwrap();

    raie(&home)
        .arg("exec")
        .arg(&file)
        .arg("--project")
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("undefined_variable:undefined_name"))
        .stdout(predicate::str::contains("Define variable 'undefined_name'"));
}

#[test]
fn test_exec_successful_program() {
    if !has_python() {
        return;
    }
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("ok.py");
    std::fs::write(&file, "print(6 * 7)\n").unwrap();

    raie(&home)
        .arg("exec")
        .arg(&file)
        .arg("--project")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("42"))
        .stdout(predicate::str::contains("Succeeded"));
}
