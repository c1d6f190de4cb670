//! Integration tests for the `acm200` CLI binary.
//!
//! Argument parsing, help output, completions and configuration run
//! without a device; routing commands run against an in-process fake
//! matrix on a loopback socket.
#![allow(clippy::unwrap_used)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// An isolated config location inside a temp dir.
struct Sandbox {
    _dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        Self { _dir: dir, config }
    }

    fn with_config(contents: &str) -> Self {
        let sandbox = Self::new();
        std::fs::write(&sandbox.config, contents).unwrap();
        sandbox
    }

    fn cmd(&self) -> assert_cmd::Command {
        acm200_cmd(&self.config)
    }
}

/// Build a [`Command`] for the `acm200` binary with env isolation.
fn acm200_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("acm200");
    cmd.env("ACM200_CONFIG", config)
        .env("NO_COLOR", "1")
        .env_remove("ACM200_PROFILE")
        .env_remove("ACM200_HOST")
        .env_remove("ACM200_PORT")
        .env_remove("ACM200_OUTPUT")
        .env_remove("ACM200_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// A port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ── Fake matrix ─────────────────────────────────────────────────────

/// Answers one command per connection and records it.
struct FakeMatrix {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakeMatrix {
    fn start(respond: fn(&str) -> String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));

        let accept_commands = Arc::clone(&commands);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let commands = Arc::clone(&accept_commands);
                thread::spawn(move || serve(stream, respond, &commands));
            }
        });

        Self { port, commands }
    }

    fn port_arg(&self) -> String {
        self.port.to_string()
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

fn serve(mut stream: TcpStream, respond: fn(&str) -> String, commands: &Mutex<Vec<String>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    let line = loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
                    break String::from_utf8_lossy(&buf[..pos]).into_owned();
                }
            }
        }
    };

    commands.lock().unwrap().push(line.clone());
    let _ = stream.write_all(respond(&line).as_bytes());

    while matches!(stream.read(&mut chunk), Ok(n) if n > 0) {}
}

fn prompt_only(_: &str) -> String {
    "ACM200>".into()
}

fn two_outputs(command: &str) -> String {
    match command {
        "STATUS" => "OUT 001 FROM IN 002\r\nOUT 002 FROM IN 001\r\nACM200>".into(),
        _ => "ACM200>".into(),
    }
}

const LOUNGE: &str = r#"
default_profile = "lounge"

[profiles.lounge]
host = "127.0.0.1"
num_outputs = 2

[profiles.lounge.input_names]
1 = "Sky Q"
2 = "Apple TV"
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    Sandbox::new().cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("ACM200")
            .and(predicate::str::contains("switch"))
            .and(predicate::str::contains("routes"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("acm200"));
}

#[test]
fn test_completions() {
    Sandbox::new()
        .cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
    Sandbox::new()
        .cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_invalid_output_format() {
    let output = Sandbox::new()
        .cmd()
        .args(["--output", "xml", "routes"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("possible values"), "Expected valid formats:\n{text}");
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_routes_without_host_or_profile() {
    Sandbox::new()
        .cmd()
        .arg("routes")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No matrix configured"));
}

#[test]
fn test_unknown_profile() {
    Sandbox::with_config(LOUNGE)
        .cmd()
        .args(["--profile", "attic", "routes"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("attic"));
}

#[test]
fn test_config_path_honours_override() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(sandbox.config.display().to_string()));
}

#[test]
fn test_config_add_and_duplicate() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["config", "add", "lounge", "--address", "10.0.0.5"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["config", "add", "den", "--address", "10.0.0.5"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("10.0.0.5:23"));

    sandbox
        .cmd()
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"lounge\"")
                .and(predicate::str::contains("\"default_profile\": \"lounge\"")),
        );
}

#[test]
fn test_set_name_then_inputs() {
    let sandbox = Sandbox::with_config(LOUNGE);

    sandbox
        .cmd()
        .args(["config", "set-name", "input", "3", "Apple TV"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["--output", "plain", "inputs"])
        .assert()
        .success()
        .stdout("Sky Q\nApple TV\nApple TV (2)\nInput 4\n");
}

#[test]
fn test_set_name_out_of_range() {
    Sandbox::with_config(LOUNGE)
        .cmd()
        .args(["config", "set-name", "output", "3", "Garden"])
        .assert()
        .code(2);
}

#[test]
fn test_info_as_json() {
    Sandbox::with_config(LOUNGE)
        .cmd()
        .args(["--output", "json", "info"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"manufacturer\": \"Blustream\"")
                .and(predicate::str::contains("\"unique_key\": \"127.0.0.1:23\"")),
        );
}

// ── Switching ───────────────────────────────────────────────────────

#[test]
fn test_switch_sends_padded_command() {
    let device = FakeMatrix::start(prompt_only);

    Sandbox::new()
        .cmd()
        .args(["--host", "127.0.0.1", "--port", &device.port_arg(), "switch", "2", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OUT002").and(predicate::str::contains("IN003")));

    assert_eq!(device.commands(), vec!["OUT002FR003"]);
}

#[test]
fn test_switch_by_label() {
    let device = FakeMatrix::start(prompt_only);

    Sandbox::with_config(LOUNGE)
        .cmd()
        .args(["--port", &device.port_arg(), "--output", "plain", "switch", "1", "Apple TV"])
        .assert()
        .success()
        .stdout("OUT001FR002\n");

    assert_eq!(device.commands(), vec!["OUT001FR002"]);
}

#[test]
fn test_switch_unknown_label_never_connects() {
    let device = FakeMatrix::start(prompt_only);

    Sandbox::with_config(LOUNGE)
        .cmd()
        .args(["--port", &device.port_arg(), "switch", "1", "Xbox"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Xbox"));

    assert!(device.commands().is_empty());
}

#[test]
fn test_switch_output_out_of_range() {
    Sandbox::new()
        .cmd()
        .args(["--host", "127.0.0.1", "--port", &closed_port().to_string(), "switch", "0", "1"])
        .assert()
        .code(2);
}

#[test]
fn test_connection_refused_exit_code() {
    Sandbox::new()
        .cmd()
        .args(["--host", "127.0.0.1", "--port", &closed_port().to_string(), "switch", "1", "1"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Could not connect"));
}

// ── Polling ─────────────────────────────────────────────────────────

#[test]
fn test_routes_as_json() {
    let device = FakeMatrix::start(two_outputs);

    Sandbox::with_config(LOUNGE)
        .cmd()
        .args(["--port", &device.port_arg(), "--output", "json", "routes"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"source\": \"Apple TV\"")
                .and(predicate::str::contains("\"source\": \"Sky Q\"")),
        );

    assert_eq!(device.commands(), vec!["STATUS"]);
}

#[test]
fn test_routes_plain_marks_unknown_outputs() {
    let device = FakeMatrix::start(|command| match command {
        "STATUS" => "OUT 001 FROM IN 002\r\nACM200>".into(),
        _ => "ACM200>".into(),
    });

    Sandbox::with_config(LOUNGE)
        .cmd()
        .args(["--port", &device.port_arg(), "--output", "plain", "routes"])
        .assert()
        .success()
        .stdout("1 2\n2 -\n");

    let commands = device.commands();
    assert_eq!(commands[0], "STATUS");
    assert!(commands.contains(&"OUT 002 STATUS".to_owned()));
}
