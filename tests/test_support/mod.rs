#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

const KEY_VARS: [&str; 3] = ["SCOREBOARD_GEMINI_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Spawns the sidecar with no analysis key in its environment.
pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(vars: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_scoreboardd");
    let mut cmd = Command::new(exe);
    for key in KEY_VARS {
        cmd.env_remove(key);
    }
    for (k, v) in vars {
        cmd.env(k, v);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn scoreboardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn read_response(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_response(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the `error` object, asserting the call failed.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

/// Writes a roster CSV with the standard header row.
pub fn write_roster_csv(dir: &Path, name: &str, rows: &[[&str; 4]]) -> PathBuf {
    let mut body = String::from("เลขที่,คำนำหน้าชื่อ ชื่อ - สกุล,ระดับชั้น,ห้องเรียน\n");
    for row in rows {
        body.push_str(&row.join(","));
        body.push('\n');
    }
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write csv");
    path
}

pub fn upload_params(paths: &[&Path]) -> serde_json::Value {
    let files: Vec<serde_json::Value> = paths
        .iter()
        .map(|p| json!({ "path": p.to_string_lossy() }))
        .collect();
    json!({ "files": files })
}

/// Uploads the files and confirms every review item.
pub fn import_roster(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    paths: &[&Path],
) -> serde_json::Value {
    let parsed = request_ok(stdin, reader, "import-parse", "upload.parse", upload_params(paths));
    let total = parsed["review"]["total"].as_u64().expect("review total");
    let mut last = json!({});
    for i in 0..total {
        last = request_ok(stdin, reader, &format!("import-confirm-{}", i), "review.confirm", json!({}));
    }
    last
}

pub fn student_ids(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    grade: &str,
) -> Vec<String> {
    let listed = request_ok(stdin, reader, "ids", "roster.list", json!({ "grade": grade }));
    listed["students"]
        .as_array()
        .expect("students array")
        .iter()
        .map(|s| s["id"].as_str().expect("id").to_string())
        .collect()
}
