#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Output, Stdio};

fn drbwire(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_drbwire"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("drbwire should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

struct EchoServer {
    child: Child,
    uri: String,
}

impl EchoServer {
    fn start(bind: &str) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_drbwire"))
            .arg("--log-level")
            .arg("error")
            .arg("--format")
            .arg("pretty")
            .arg("serve")
            .arg(bind)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("serve should start");

        let out = child.stdout.take().expect("stdout should be piped");
        let mut line = String::new();
        BufReader::new(out)
            .read_line(&mut line)
            .expect("serve should print its uri");
        Self {
            child,
            uri: line.trim().to_string(),
        }
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn encode_string_prints_hex() {
    let output = drbwire(&["--format", "pretty", "encode", "hi"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "04084922076869063a064554");
}

#[test]
fn encode_integers_as_array() {
    let output = drbwire(&["--format", "pretty", "encode", "0", "-1", "nil"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "04085b08690069fa30");
}

#[test]
fn decode_prints_value_as_json() {
    let output = drbwire(&["--format", "json", "decode", "0408 5b07 5449 2206 6106 3a06 4554"]);
    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("\"kind\":\"array\""), "stdout: {stdout}");
    assert!(stdout.contains("\"value\":[true,\"a\"]"), "stdout: {stdout}");
}

#[test]
fn decode_unsupported_construct_returns_60() {
    let output = drbwire(&["decode", "0408660831 2e35"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("decode failed"), "stderr: {stderr}");
}

#[test]
fn decode_bad_hex_is_usage_error() {
    let output = drbwire(&["decode", "04zz"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn call_against_echo_server() {
    let server = EchoServer::start("druby://127.0.0.1:0");
    assert!(server.uri.starts_with("druby://127.0.0.1:"), "uri: {}", server.uri);

    let output = drbwire(&["--format", "json", "call", &server.uri, "greet", "world", "7"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = stdout(&output);
    assert!(stdout.contains("\"success\":true"), "stdout: {stdout}");
    assert!(stdout.contains("\"value\":[\"greet\",\"world\",7]"), "stdout: {stdout}");
}

#[test]
fn call_with_raw_includes_result_bytes() {
    let server = EchoServer::start("druby://127.0.0.1:0");

    let output = drbwire(&["--format", "json", "call", "--raw", &server.uri, "ping"]);
    assert!(output.status.success());
    let stdout = stdout(&output);
    // ["ping"] as a marshalled array
    assert!(
        stdout.contains("\"raw_hex\":\"04085b0649220970696e67063a064554\""),
        "stdout: {stdout}"
    );
}

#[test]
fn call_over_unix_socket() {
    let path = std::env::temp_dir().join(format!("drbwire-cli-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let bind = format!("drbunix:{}", path.display());
    let server = EchoServer::start(&bind);
    assert_eq!(server.uri, bind);

    let output = drbwire(&["--format", "json", "call", &server.uri, "size", ":k"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("{\"symbol\":\"k\"}"));

    drop(server);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn call_refused_returns_transport_error() {
    let output = drbwire(&["call", "druby://127.0.0.1:1", "anything"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn call_rejects_bad_uri() {
    let output = drbwire(&["call", "tcp://127.0.0.1:1", "anything"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn version_reports_package_version() {
    let output = drbwire(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        format!("drbwire {}", env!("CARGO_PKG_VERSION"))
    );
}
