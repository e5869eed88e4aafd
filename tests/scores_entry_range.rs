mod test_support;

use serde_json::json;
use test_support::{
    error_code, import_roster, request_err, request_ok, spawn_sidecar, student_ids, temp_dir,
    write_roster_csv,
};

fn set_thai(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    id: &str,
    student_id: &str,
    value: serde_json::Value,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        id,
        "entry.setCell",
        json!({ "studentId": student_id, "subject": "ภาษาไทย", "value": value }),
    )
}

#[test]
fn out_of_range_typing_is_ignored_and_save_merges() {
    let dir = temp_dir("scoreboard-entry-range");
    let csv = write_roster_csv(&dir, "p6.csv", &[["1", "ก", "ป.6", ""], ["2", "ข", "ป.6", ""]]);
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = import_roster(&mut stdin, &mut reader, &[&csv]);
    let ids = student_ids(&mut stdin, &mut reader, "ป.6");

    // An earlier save of another subject must survive the sheet save.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "scores.save",
        json!({ "scores": { "ครั้งที่ 1": { "ป.6": { ids[1].clone(): { "วิทยาศาสตร์": 66 } } } } }),
    );

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "entry.open",
        json!({ "attempt": "ครั้งที่ 1", "grade": "ป.6" }),
    );
    assert_eq!(opened["sheet"]["kind"], json!("singleAttempt"));
    assert_eq!(opened["sheet"]["rows"].as_array().map(|r| r.len()), Some(2));

    let ok = set_thai(&mut stdin, &mut reader, "3", &ids[0], json!("72"));
    assert_eq!(ok["edit"]["applied"], json!(true));
    assert_eq!(ok["edit"]["value"], json!(72.0));

    for (i, bad) in [json!("150"), json!("-5"), json!("abc")].into_iter().enumerate() {
        let resp = set_thai(&mut stdin, &mut reader, &format!("bad{}", i), &ids[0], bad);
        assert_eq!(resp["edit"]["applied"], json!(false));
        assert_eq!(resp["edit"]["value"], json!(72.0));
    }
    let numeric = set_thai(&mut stdin, &mut reader, "4", &ids[0], json!(88.5));
    assert_eq!(numeric["edit"]["value"], json!(88.5));
    let row = &numeric["sheet"]["rows"][0];
    assert_eq!(row["cells"][0]["status"], json!("pass"));

    let saved = request_ok(&mut stdin, &mut reader, "5", "entry.save", json!({}));
    assert!(saved["revision"].as_u64().is_some());
    let error = request_err(&mut stdin, &mut reader, "6", "entry.get", json!({}));
    assert_eq!(error_code(&error), "no_entry_sheet");

    let scores = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "scores.get",
        json!({ "attempt": "ครั้งที่ 1", "grade": "ป.6" }),
    );
    assert_eq!(scores["scores"][&ids[0]]["ภาษาไทย"], json!(88.5));
    assert_eq!(scores["scores"][&ids[0]]["คณิตศาสตร์"], json!(null));
    assert_eq!(scores["scores"][&ids[1]]["วิทยาศาสตร์"], json!(66.0));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn bulk_save_rejects_out_of_range_and_wrong_sheet_calls() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "scores.save",
        json!({ "scores": { "ครั้งที่ 2": { "ป.1": { "s1": { "การอ่านออกเสียง": 101 } } } } }),
    );
    assert_eq!(error_code(&error), "bad_score");
    let scores = request_ok(&mut stdin, &mut reader, "2", "scores.get", json!({}));
    assert_eq!(scores["scores"], json!({}));

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "entry.open",
        json!({ "attempt": "Pre RT ป.1 (ครั้งที่ 1)", "grade": "ป.1" }),
    );
    assert_eq!(error_code(&error), "bad_params");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "entry.open",
        json!({ "attempt": "ครั้งที่ 1", "grade": "ม.3", "classroom": "7" }),
    );
    assert_eq!(error_code(&error), "bad_params");
}

#[test]
fn pre_test_sheet_reports_development_and_saves_both_rounds() {
    let dir = temp_dir("scoreboard-entry-pretest");
    let csv = write_roster_csv(&dir, "m3.csv", &[["1", "ก", "ม.3", "1"], ["2", "ข", "ม.3", "2"]]);
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = import_roster(&mut stdin, &mut reader, &[&csv]);
    let ids = student_ids(&mut stdin, &mut reader, "ม.3");

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "entry.openPreTest",
        json!({ "group": "Pre O-NET ม.3", "classroom": "1" }),
    );
    assert_eq!(opened["sheet"]["kind"], json!("preTest"));
    assert_eq!(opened["sheet"]["rows"].as_array().map(|r| r.len()), Some(1));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "entry.setCell",
        json!({ "studentId": ids[0], "round": 1, "value": "40" }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "entry.setCell",
        json!({ "studentId": ids[0], "round": 2, "value": "55" }),
    );
    let row = &second["sheet"]["rows"][0];
    assert_eq!(row["development"], json!(15.0));
    assert_eq!(row["average"], json!(47.5));

    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "entry.setCell",
        json!({ "studentId": ids[0], "subject": "ภาษาไทย", "value": "1" }),
    );
    assert_eq!(error_code(&error), "bad_params");

    let all = request_ok(&mut stdin, &mut reader, "5", "entry.setClassroom", json!({ "classroom": "all" }));
    assert_eq!(all["sheet"]["rows"].as_array().map(|r| r.len()), Some(2));

    let _ = request_ok(&mut stdin, &mut reader, "6", "entry.save", json!({}));
    let round2 = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "scores.get",
        json!({ "attempt": "Pre O-NET ม.3 (ครั้งที่ 2)", "grade": "ม.3" }),
    );
    assert_eq!(round2["scores"][&ids[0]]["overall_score"], json!(55.0));
    assert_eq!(round2["scores"][&ids[1]]["overall_score"], json!(null));

    let _ = std::fs::remove_dir_all(dir);
}
