#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn projgen(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("projgen").unwrap();
    cmd.current_dir(dir.path()).env("PROJGEN_ROOT", dir.path());
    cmd
}

/// Point the command agent at `sh -c <script>`.
#[cfg(unix)]
fn configure_agent(dir: &TempDir, script: &str) {
    let yaml = format!(
        "agent:\n  kind: command\n  command: sh\n  args:\n    - -c\n    - {}\n",
        yaml_quote(script)
    );
    std::fs::write(dir.path().join("projgen.yaml"), yaml).unwrap();
}

#[cfg(unix)]
fn yaml_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// ---------------------------------------------------------------------------
// projgen init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_config_and_projects_dir() {
    let dir = TempDir::new().unwrap();
    projgen(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: projgen.yaml"));

    assert!(dir.path().join("projgen.yaml").is_file());
    assert!(dir.path().join("generated_projects").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    projgen(&dir).arg("init").assert().success();
    projgen(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  projgen.yaml"));
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("projgen.yaml"), "jobs: [not, a, map\n").unwrap();
    projgen(&dir)
        .args(["projects", "list", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

// ---------------------------------------------------------------------------
// projgen extract
// ---------------------------------------------------------------------------

#[test]
fn extract_reads_fenced_output_from_stdin() {
    let dir = TempDir::new().unwrap();
    projgen(&dir)
        .args(["--json", "extract"])
        .write_stdin("Here it is:\n```json\n{\"main.py\": \"print(1)\",}\n```\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"main.py\": \"print(1)\""));
}

#[test]
fn extract_reports_missing_json() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("reply.txt"), "Sorry, I cannot help with that.").unwrap();
    projgen(&dir)
        .args(["extract", "reply.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no JSON object found"));
}

// ---------------------------------------------------------------------------
// projgen build / projects
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn build_materializes_and_projects_commands_read_back() {
    let dir = TempDir::new().unwrap();
    configure_agent(
        &dir,
        r#"cat >/dev/null; printf '```json\n{"main.py": "import pygame", "requirements.txt": "pygame"}\n```\n'"#,
    );

    projgen(&dir)
        .args([
            "build",
            "--owner",
            "42",
            "--technology",
            "Python, Pygame",
            "Build a Snake Game",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ 20%]"))
        .stdout(predicate::str::contains("[100%]"));

    let project = dir.path().join("generated_projects/42/Build_a_Snake");
    assert_eq!(
        std::fs::read_to_string(project.join("main.py")).unwrap(),
        "import pygame"
    );
    assert!(project.join("project_info.json").is_file());

    projgen(&dir)
        .args(["projects", "list", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Build_a_Snake"));

    projgen(&dir)
        .args(["projects", "show", "42", "build_a_snake"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tech stack:  Python, Pygame"));

    projgen(&dir)
        .args(["projects", "cat", "42", "Build_a_Snake", "requirements.txt"])
        .assert()
        .success()
        .stdout("pygame");

    projgen(&dir)
        .args(["projects", "cat", "42", "Build_a_Snake", "../../../projgen.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("access denied"));
}

#[cfg(unix)]
#[test]
fn build_reports_rate_limit() {
    let dir = TempDir::new().unwrap();
    configure_agent(
        &dir,
        "cat >/dev/null; echo 'Error code: 429 - quota exceeded' >&2; exit 1",
    );

    projgen(&dir)
        .args([
            "--json",
            "build",
            "--owner",
            "7",
            "-t",
            "Python",
            "Build a Snake Game",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error_kind\": \"rate_limited\""));

    assert!(!dir.path().join("generated_projects/7").exists());
}
