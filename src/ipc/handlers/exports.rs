use crate::entry::{EntryError, EntrySheet, PreTestSheet, SingleAttemptSheet};
use crate::export::{self, Format};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{optional_str, required_path, required_str};
use crate::ipc::types::{AppState, Request};
use crate::pdf::PdfFont;
use serde_json::json;
use std::path::PathBuf;

fn single_sheet(state: &AppState) -> Result<&SingleAttemptSheet, EntryError> {
    match state.entry.as_ref() {
        Some(EntrySheet::SingleAttempt(s)) => Ok(s),
        Some(EntrySheet::PreTest(_)) => Err(EntryError::WrongSheet("single-attempt")),
        None => Err(EntryError::NoSheet),
    }
}

fn pre_test_sheet(state: &AppState) -> Result<&PreTestSheet, EntryError> {
    match state.entry.as_ref() {
        Some(EntrySheet::PreTest(s)) => Ok(s),
        Some(EntrySheet::SingleAttempt(_)) => Err(EntryError::WrongSheet("pre-test")),
        None => Err(EntryError::NoSheet),
    }
}

/// `params.format` is `"xlsx"` (default) or `"pdf"`; PDF loads the configured font.
fn export_format(state: &AppState, req: &Request) -> Result<Format, HandlerErr> {
    match optional_str(&req.params, "format").unwrap_or("xlsx") {
        "xlsx" => Ok(Format::Xlsx),
        "pdf" => Ok(Format::Pdf(PdfFont::load(state.config.pdf_font.as_deref())?)),
        other => Err(HandlerErr::bad_params(format!("unknown export format {}", other))),
    }
}

fn written(path: anyhow::Result<PathBuf>) -> Result<serde_json::Value, HandlerErr> {
    let path = path.map_err(|e| HandlerErr::internal("export_failed", e))?;
    Ok(json!({ "path": path.to_string_lossy() }))
}

fn handle_class_summary(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_dir = required_path(&req.params, "outDir")?;
    let sheet = single_sheet(state)?;
    let format = export_format(state, req)?;
    written(export::write_class_summary(sheet, &out_dir, &format))
}

fn handle_student_reports(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let out_dir = required_path(&req.params, "outDir")?;
    let sheet = single_sheet(state)?;
    let format = export_format(state, req)?;
    match export::write_student_reports(sheet, &out_dir, &format) {
        Ok(Some(path)) => Ok(json!({ "path": path.to_string_lossy() })),
        Ok(None) => Err(HandlerErr::new("no_students", "no students to export")),
        Err(e) => Err(HandlerErr::internal("export_failed", e)),
    }
}

fn handle_student_report(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_dir = required_path(&req.params, "outDir")?;
    let student_id = required_str(&req.params, "studentId")?;
    let sheet = single_sheet(state)?;
    let student = sheet
        .student(student_id)
        .ok_or_else(|| EntryError::StudentNotFound(student_id.to_string()))?;
    let format = export_format(state, req)?;
    written(export::write_student_report(sheet, student, &out_dir, &format))
}

fn handle_pre_test_student(
    state: &AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let out_dir = required_path(&req.params, "outDir")?;
    let student_id = required_str(&req.params, "studentId")?;
    let sheet = pre_test_sheet(state)?;
    let student = sheet
        .student(student_id)
        .ok_or_else(|| EntryError::StudentNotFound(student_id.to_string()))?;
    let format = export_format(state, req)?;
    written(export::write_pre_test_student(sheet, student, &out_dir, &format))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "export.classSummary" => handle_class_summary(state, req),
        "export.studentReports" => handle_student_reports(state, req),
        "export.studentReport" => handle_student_report(state, req),
        "export.preTestStudent" => handle_pre_test_student(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
