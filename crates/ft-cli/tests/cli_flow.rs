//! Integration tests that drive the `ft` binary.
//!
//! The API host points at a closed local port, so every Kimai call fails
//! fast; these tests cover wiring, configuration and failure reporting.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Output, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

fn ft_binary() -> String {
    env!("CARGO_BIN_EXE_ft").to_string()
}

/// `ft` isolated from the user's config directory and environment.
fn ft_command(home: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(ft_binary());
    command
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("FT_API_TOKEN")
        .env_remove("FT_API_HOST")
        .env_remove("FT_SIDES")
        .env_remove("RUST_LOG")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

/// Runs `ft` to completion with `stdin` as its whole input.
fn ft(home: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = ft_command(home, args)
        .spawn()
        .expect("failed to spawn ft");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().expect("failed to wait for ft")
}

fn write_config(dir: &Path, token: &str) -> String {
    let path = dir.join("ft.toml");
    std::fs::write(
        &path,
        format!(
            r#"
api_token = "{token}"
api_host = "http://127.0.0.1:1"
sides = ["", "", "", "10.20", "", "50.60"]
request_timeout_secs = 2
start_retry_delay_ms = 0
"#
        ),
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    let output = ft(temp.path(), &["--help"], "");

    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["watch", "status", "flip", "init", "sides"] {
        assert!(help.contains(command), "missing {command} in: {help}");
    }
}

#[test]
fn test_init_writes_template_once() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");
    let path_arg = path.to_string_lossy().into_owned();

    let first = ft(temp.path(), &["--config", &path_arg, "init"], "");
    assert!(first.status.success());
    assert!(String::from_utf8_lossy(&first.stdout).contains("Please edit the config file"));
    assert!(path.exists());

    let second = ft(temp.path(), &["--config", &path_arg, "init"], "");
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stdout).contains("already exists"));
}

#[test]
fn test_missing_token_is_fatal() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");

    let output = ft(temp.path(), &["--config", &config, "status"], "");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Please edit the config file"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_sides_prints_mapping() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");

    let output = ft(temp.path(), &["--config", &config, "sides"], "");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3: 10.20"));
    assert!(stdout.contains("5: 50.60"));
    assert!(stdout.contains("4: -"));
}

#[test]
fn test_status_reports_unreachable_host() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "token");

    let output = ft(temp.path(), &["--config", &config, "status"], "");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Could not read current activity!"), "{stdout}");
}

#[test]
fn test_watch_survives_unreachable_host() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "token");

    let output = ft(temp.path(), &["--config", &config, "watch"], "0\n3\n");

    assert!(
        output.status.success(),
        "watch failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Could not read current activity!"), "{stdout}");
    assert!(stdout.contains("Tracker is in its base"), "{stdout}");
    assert!(stdout.contains("Could not start activity!"), "{stdout}");
}

#[test]
fn test_flip_to_unmapped_side() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "token");

    let output = ft(temp.path(), &["--config", &config, "flip", "7"], "");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No task assigned to side 7"), "{stdout}");
}

/// A running `ft watch` whose stdin stays open.
struct Watcher {
    child: Child,
    stdin: ChildStdin,
    lines: mpsc::Receiver<String>,
}

impl Watcher {
    fn spawn(home: &Path, config: &str) -> Self {
        let mut child = ft_command(home, &["--config", config, "watch"])
            .spawn()
            .expect("failed to spawn ft watch");
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let (tx, lines) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            child,
            stdin,
            lines,
        }
    }

    fn send(&mut self, line: &str) {
        writeln!(self.stdin, "{line}").unwrap();
        self.stdin.flush().unwrap();
    }

    fn wait_for_line(&self, needle: &str) {
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) if line.contains(needle) => return,
                Ok(_) => {}
                Err(err) => panic!("no line containing {needle:?}: {err}"),
            }
        }
    }

    fn wait_exit(&mut self, timeout: Duration) -> Option<std::process::ExitStatus> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait().unwrap() {
                return Some(status);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        None
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(unix)]
#[test]
fn test_watch_exits_on_interrupt_with_stdin_open() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "token");
    let mut watcher = Watcher::spawn(temp.path(), &config);

    watcher.send("0");
    watcher.wait_for_line("Tracker is in its base");

    let killed = Command::new("kill")
        .args(["-INT", &watcher.child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = watcher
        .wait_exit(Duration::from_secs(10))
        .expect("ft watch ignored SIGINT");
    assert!(status.success(), "exit status: {status}");
}

#[test]
fn test_second_watch_is_refused() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "token");
    let mut first = Watcher::spawn(temp.path(), &config);
    first.send("0");
    first.wait_for_line("Tracker is in its base");

    let second = ft(temp.path(), &["--config", &config, "watch"], "0\n");

    assert!(!second.status.success());
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("already running"), "unexpected stderr: {stderr}");
    assert!(first.wait_exit(Duration::from_millis(100)).is_none());
}
