mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, spawn_sidecar, temp_dir};

fn select_workspace(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    dir: &std::path::Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": dir.to_string_lossy() }),
    );
}

#[test]
fn handoff_requires_workspace_and_prior_store() {
    let dir = temp_dir("scoreboard-handoff-missing");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let error = request_err(&mut stdin, &mut reader, "1", "report.handoff.store", json!({}));
    assert_eq!(error_code(&error), "no_workspace");

    select_workspace(&mut stdin, &mut reader, &dir);
    let error = request_err(&mut stdin, &mut reader, "2", "report.handoff.load", json!({}));
    assert_eq!(error_code(&error), "handoff_missing");
    assert_eq!(error["details"]["key"], json!("reportData_charts"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn stored_report_survives_a_new_session() {
    let dir = temp_dir("scoreboard-handoff-roundtrip");
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        select_workspace(&mut stdin, &mut reader, &dir);
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "scores.save",
            json!({ "scores": {
                "ครั้งที่ 1": { "ป.1": { "a": { "การอ่านรู้เรื่อง": 72 } } },
                "Pre RT ป.1 (ครั้งที่ 2)": { "ป.1": { "a": { "overall_score": 48.5 } } }
            } }),
        );
        let stored = request_ok(&mut stdin, &mut reader, "2", "report.handoff.store", json!({}));
        assert_eq!(stored["keys"], json!(["reportData_charts", "reportData_scores"]));
        drop(stdin);
        let _ = child.wait();
    }

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &dir);
    let loaded = request_ok(&mut stdin, &mut reader, "3", "report.handoff.load", json!({}));
    let report = &loaded["report"];
    assert_eq!(report["academicYear"], json!("2568"));

    let table = &report["table"];
    let columns = table["columns"].as_array().expect("columns");
    let first = columns.iter().position(|c| c == "ครั้งที่ 1").expect("column");
    let foreign = columns
        .iter()
        .position(|c| c == "Pre NT ป.3 (ครั้งที่ 1)")
        .expect("column");
    let p1_row = &table["rows"][0];
    assert_eq!(p1_row["subject"], json!("การอ่านรู้เรื่อง"));
    assert_eq!(p1_row["cells"][first], json!("72.00"));
    assert_eq!(p1_row["cells"][foreign], json!("N/A"));

    let p1_cmp = &report["preTestComparison"][0];
    assert_eq!(p1_cmp["label"], json!("Pre RT (ป.1)"));
    assert_eq!(p1_cmp["round1"], json!(0.0));
    assert_eq!(p1_cmp["round2"], json!(48.5));

    assert_eq!(loaded["scores"]["ครั้งที่ 1"]["ป.1"]["a"]["การอ่านรู้เรื่อง"], json!(72.0));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn tampered_payload_is_reported_as_corrupt() {
    let dir = temp_dir("scoreboard-handoff-corrupt");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &dir);
    let _ = request_ok(&mut stdin, &mut reader, "1", "report.handoff.store", json!({}));

    let conn = rusqlite::Connection::open(dir.join("scoreboard.sqlite3")).expect("open db");
    conn.execute(
        "UPDATE handoff SET value = ? WHERE key = ?",
        ("{\"broken\":", "reportData_scores"),
    )
    .expect("tamper");
    drop(conn);

    let error = request_err(&mut stdin, &mut reader, "2", "report.handoff.load", json!({}));
    assert_eq!(error_code(&error), "handoff_corrupt");
    assert_eq!(error["details"]["key"], json!("reportData_scores"));

    let _ = std::fs::remove_dir_all(dir);
}
