mod test_support;

use serde_json::json;
use test_support::{
    error_code, request_err, request_ok, spawn_sidecar, student_ids, temp_dir, upload_params,
    write_roster_csv,
};

#[test]
fn two_file_queue_advances_then_commits_with_combined_message() {
    let dir = temp_dir("scoreboard-review-two");
    let a = write_roster_csv(
        &dir,
        "p1.csv",
        &[["1", "ก", "ป.1", ""], ["2", "ข", "ป.1", ""], ["3", "ค", "ป.1", ""]],
    );
    let b = write_roster_csv(&dir, "m3.csv", &[["1", "ง", "ม.3", "1"], ["2", "จ", "ม.3", "2"]]);
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let parsed = request_ok(&mut stdin, &mut reader, "1", "upload.parse", upload_params(&[&a, &b]));
    assert_eq!(parsed["review"]["current"], json!(1));
    assert_eq!(parsed["review"]["total"], json!(2));
    assert_eq!(parsed["review"]["fileName"], json!("p1.csv"));
    assert_eq!(parsed["review"]["confirmLabel"], json!("ยืนยันและไฟล์ถัดไป"));

    // Upload alone commits nothing.
    assert!(student_ids(&mut stdin, &mut reader, "ป.1").is_empty());

    let first = request_ok(&mut stdin, &mut reader, "2", "review.confirm", json!({}));
    assert_eq!(first["progress"]["state"], json!("advanced"));
    assert_eq!(first["review"]["current"], json!(2));
    assert_eq!(first["review"]["fileName"], json!("m3.csv"));
    assert_eq!(first["review"]["confirmLabel"], json!("ยืนยันและนำเข้าข้อมูล"));
    assert_eq!(first["message"], json!(null));
    assert_eq!(student_ids(&mut stdin, &mut reader, "ป.1").len(), 3);

    let second = request_ok(&mut stdin, &mut reader, "3", "review.confirm", json!({}));
    assert_eq!(second["progress"]["state"], json!("finished"));
    assert_eq!(second["message"], json!("นำเข้าข้อมูลนักเรียน 5 คน จาก 2 ไฟล์สำเร็จ"));
    assert_eq!(second["review"], json!(null));

    let banners = second["banners"].as_array().expect("banners");
    let m3 = banners.iter().find(|b| b["grade"] == json!("ม.3")).expect("m3");
    assert_eq!(m3["status"], json!("COMPLETE"));
    assert_eq!(m3["studentCount"], json!(2));
    assert!(m3["lastUpdatedLabel"].as_str().unwrap_or("").ends_with("น."));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn cancel_discards_queue_and_pending_edits() {
    let dir = temp_dir("scoreboard-review-cancel");
    let a = write_roster_csv(&dir, "a.csv", &[["1", "ก", "ป.6", ""]]);
    let b = write_roster_csv(&dir, "b.csv", &[["1", "ข", "ป.6", ""]]);
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let parsed = request_ok(&mut stdin, &mut reader, "1", "upload.parse", upload_params(&[&a, &b]));
    let id = parsed["review"]["students"][0]["id"].as_str().expect("id").to_string();
    let edited = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "review.updateStudent",
        json!({ "studentId": id, "field": "name", "value": "แก้ไขแล้ว" }),
    );
    assert_eq!(edited["review"]["students"][0]["name"], json!("แก้ไขแล้ว"));
    assert_eq!(edited["review"]["students"][0]["id"], json!(id));

    let cancelled = request_ok(&mut stdin, &mut reader, "3", "review.cancel", json!({}));
    assert_eq!(cancelled["cancelled"], json!(true));
    assert!(student_ids(&mut stdin, &mut reader, "ป.6").is_empty());

    let error = request_err(&mut stdin, &mut reader, "4", "review.confirm", json!({}));
    assert_eq!(error_code(&error), "not_reviewing");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn edit_flow_replaces_grade_roster() {
    let dir = temp_dir("scoreboard-review-edit");
    let a = write_roster_csv(&dir, "p3.csv", &[["1", "ก", "ป.3", ""], ["2", "ข", "ป.3", ""]]);
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = test_support::import_roster(&mut stdin, &mut reader, &[&a]);
    let ids = student_ids(&mut stdin, &mut reader, "ป.3");

    let error = request_err(&mut stdin, &mut reader, "1", "review.startEdit", json!({ "grade": "ม.6" }));
    assert_eq!(error_code(&error), "no_students");

    let started = request_ok(&mut stdin, &mut reader, "2", "review.startEdit", json!({ "grade": "ป.3" }));
    assert_eq!(started["review"]["fileName"], json!("นักเรียนชั้น ป.3"));
    assert_eq!(started["review"]["confirmLabel"], json!("ยืนยันการแก้ไข"));

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "review.updateStudent",
        json!({ "studentId": ids[0], "field": "classroom", "value": "9" }),
    );
    assert_eq!(error_code(&error), "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "review.updateStudent",
        json!({ "studentId": ids[1], "field": "rollNumber", "value": "22" }),
    );
    let done = request_ok(&mut stdin, &mut reader, "5", "review.confirm", json!({}));
    assert_eq!(done["message"], json!("ข้อมูลระดับชั้น ป.3 ได้รับการอัปเดตแล้ว"));

    let listed = request_ok(&mut stdin, &mut reader, "6", "roster.list", json!({ "grade": "ป.3" }));
    let students = listed["students"].as_array().expect("students");
    assert_eq!(students.len(), 2);
    assert_eq!(students[1]["rollNumber"], json!("22"));
    assert_eq!(students[1]["id"], json!(ids[1]));

    let _ = std::fs::remove_dir_all(dir);
}
