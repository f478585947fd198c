#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value as JsonValue;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "typedwire-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn typedwire(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_typedwire"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("typedwire should run")
}

fn stdout_json(output: &Output) -> JsonValue {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn version_prints_package_version() {
    let output = typedwire(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("typedwire {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn encode_reports_metadata() {
    let output = typedwire(&["--format", "json", "encode", "42"]);
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["metadata"]["type"], "integer");
    assert_eq!(json["metadata"]["size"], 2);
    assert_eq!(json["payload_size"], 2);
    assert!(json["metadata"]["id"].is_string());
}

#[test]
fn encode_then_decode_converts_units() {
    let dir = unique_temp_dir("units");
    let msg = dir.join("msg.bin");
    let msg_arg = msg.to_str().expect("utf-8 path");

    let encoded = typedwire(&[
        "--format",
        "raw",
        "encode",
        "2.5",
        "--typedef",
        r#"{"type": "scalar", "subtype": "float", "precision": 32, "units": "cm"}"#,
        "--output",
        msg_arg,
    ]);
    assert!(encoded.status.success(), "{}", String::from_utf8_lossy(&encoded.stderr));
    assert!(encoded.stdout.is_empty());

    let decoded = typedwire(&[
        "--format",
        "json",
        "decode",
        msg_arg,
        "--typedef",
        r#"{"type": "scalar", "subtype": "float", "precision": 32, "units": "m"}"#,
    ]);
    assert!(decoded.status.success(), "{}", String::from_utf8_lossy(&decoded.stderr));

    let json = stdout_json(&decoded);
    assert_eq!(json["value"]["units"], "m");
    assert_eq!(json["value"]["value"], 0.025);
    assert_eq!(json["metadata"]["units"], "cm");
    assert_eq!(json["metadata"]["size"], 4);
    assert_eq!(json["metadata"]["incomplete"], false);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_reads_stdin() {
    use std::io::Write;
    use std::process::Stdio;

    let encoded = typedwire(&["--format", "raw", "encode", r#"{"name": "probe", "ok": true}"#]);
    assert!(encoded.status.success());

    let mut child = Command::new(env!("CARGO_BIN_EXE_typedwire"))
        .args(["--log-level", "error", "--format", "json", "decode"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("decode should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(&encoded.stdout)
        .expect("stdin should accept the message");
    let output = child.wait_with_output().expect("decode should finish");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["value"], serde_json::json!({"name": "probe", "ok": true}));
    assert_eq!(json["metadata"]["type"], "object");
}

#[test]
fn precision_overflow_is_data_invalid() {
    let output = typedwire(&[
        "--format",
        "json",
        "encode",
        "300",
        "--typedef",
        r#"{"type": "int", "precision": 8}"#,
    ]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn reserved_header_key_is_usage_error() {
    let output = typedwire(&["--format", "json", "encode", "1", "--header", r#"{"size": 10}"#]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn decode_rejects_unframed_input() {
    let dir = unique_temp_dir("garbage");
    let path = dir.join("garbage.bin");
    std::fs::write(&path, b"not a framed message").expect("write garbage");

    let output = typedwire(&["--format", "json", "decode", path.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn types_lists_builtin_types() {
    let output = typedwire(&["--format", "json", "types"]);
    assert!(output.status.success());

    let json = stdout_json(&output);
    let names: Vec<&str> = json
        .as_array()
        .expect("types output should be an array")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    for expected in ["scalar", "float", "int", "uint", "complex", "bytes", "array", "object", "string"] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
}
