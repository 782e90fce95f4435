use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;

fn get_toy_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_toy"))
}

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(source.as_bytes()).expect("Failed to write script");
    file
}

#[test]
fn test_version_flag() {
    let output = get_toy_binary()
        .arg("--version")
        .output()
        .expect("Failed to execute toy");

    assert!(output.status.success(), "Version flag should succeed");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("toy"), "Version output should contain 'toy'");
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")), "Version output should contain version number");
}

#[test]
fn test_run_file() {
    let file = script("let x = 10;\nif (x > 5) { print(\"big\"); }\nprint(x * 2);\n");
    let output = get_toy_binary()
        .arg(file.path())
        .output()
        .expect("Failed to execute toy");

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "big\n20\n");
}

#[test]
fn test_eval_flag() {
    let output = get_toy_binary()
        .args(["-e", "print({1, 2, 3}, null);"])
        .output()
        .expect("Failed to execute toy");

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "[1, 2, 3] None\n");
}

#[test]
fn test_program_from_stdin() {
    let mut child = get_toy_binary()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn toy");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"parallel { print(1); } parallel { print(2); }")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "1\n2\n");
}

#[test]
fn test_input_reads_stdin_lines() {
    let file = script("let name = input();\nprint(\"Hello, \" + name);\n");
    let mut child = get_toy_binary()
        .arg(file.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn toy");

    child.stdin.take().unwrap().write_all(b"Alice\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "Hello, Alice\n");
}

#[test]
fn test_runtime_error_exit_code_and_report() {
    let file = script("print(\"before\");\nprint(1 / 0);\nprint(\"after\");\n");
    let output = get_toy_binary()
        .arg(file.path())
        .args(["--color", "never"])
        .output()
        .expect("Failed to execute toy");

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "before\n");
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("Error: Division by zero\n"), "stderr: {}", stderr);
    assert!(stderr.contains("error[E0204]"), "stderr: {}", stderr);
    assert!(stderr.contains("print(1 / 0);"), "stderr: {}", stderr);
}

#[test]
fn test_check_mode_does_not_run() {
    let output = get_toy_binary()
        .args(["--check", "-e", "print(1);"])
        .output()
        .expect("Failed to execute toy");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_check_mode_reports_syntax_errors() {
    let output = get_toy_binary()
        .args(["--check", "--color", "never", "-e", "print(1"])
        .output()
        .expect("Failed to execute toy");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Syntax error at line 1"), "stderr: {}", stderr);
    assert!(stderr.contains("<eval>:1:"), "stderr: {}", stderr);
}

#[test]
fn test_tokens_mode() {
    let output = get_toy_binary()
        .args(["--tokens", "-e", "let x = 1;"])
        .output()
        .expect("Failed to execute toy");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.first(), Some(&"1:1\t`let`"));
    assert!(lines.contains(&"1:5\tidentifier `x`"));
    assert_eq!(lines.last(), Some(&"1:11\tend of input"));
}

#[test]
fn test_ast_mode() {
    let output = get_toy_binary()
        .args(["--ast", "-e", "print(1 + 2);"])
        .output()
        .expect("Failed to execute toy");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Print"));
    assert!(stdout.contains("Add"));
}

#[test]
fn test_missing_file() {
    let output = get_toy_binary()
        .arg("definitely/not/here.toy")
        .args(["--color", "never"])
        .output()
        .expect("Failed to execute toy");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Failed to read 'definitely/not/here.toy'"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_color_choice() {
    let output = get_toy_binary()
        .args(["--color", "sometimes", "-e", "print(1);"])
        .output()
        .expect("Failed to execute toy");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Invalid color choice"), "stderr: {}", stderr);
}

#[test]
fn test_shell_completions() {
    let output = get_toy_binary()
        .args(["complete", "bash"])
        .output()
        .expect("Failed to execute toy");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("toy"));
}
