//! Student roster uploads: parse every file, validate the whole batch, hand the
//! per-file lists to review. Nothing here touches the roster store.

use crate::error::ErrorCode;
use crate::roster::StudentRecord;
use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_MIME: &str = "text/csv";

const EXAMPLE_LIMIT: usize = 3;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: Option<String>,
}

impl UploadFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            path,
            name,
            mime_type: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Xlsx,
    Csv,
}

impl FileKind {
    pub fn detect(file: &UploadFile) -> Option<Self> {
        if let Some(mime) = file.mime_type.as_deref() {
            return match mime {
                XLSX_MIME => Some(Self::Xlsx),
                CSV_MIME => Some(Self::Csv),
                _ => None,
            };
        }
        let ext = Path::new(&file.name)
            .extension()
            .or_else(|| file.path.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") => Some(Self::Xlsx),
            Some("csv") => Some(Self::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompleteExample {
    pub roll_number: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateExample {
    pub name: String,
    pub grade: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub incomplete_count: usize,
    pub duplicate_count: usize,
    pub incomplete_examples: Vec<IncompleteExample>,
    pub duplicate_examples: Vec<DuplicateExample>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.incomplete_count == 0 && self.duplicate_count == 0
    }

    pub fn message(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.incomplete_count > 0 {
            let examples: Vec<String> = self
                .incomplete_examples
                .iter()
                .map(|e| {
                    format!(
                        "(เลขที่: {}, ชื่อ: {})",
                        or_na(&e.roll_number),
                        or_na(&e.name)
                    )
                })
                .collect();
            parts.push(format!(
                "พบ {} รายการข้อมูลไม่สมบูรณ์ (ไม่มีชื่อหรือระดับชั้น) ตัวอย่าง: {}.",
                self.incomplete_count,
                examples.join(", ")
            ));
        }
        if self.duplicate_count > 0 {
            let examples: Vec<String> = self
                .duplicate_examples
                .iter()
                .map(|d| format!("{} (ชั้น {})", d.name, d.grade))
                .collect();
            parts.push(format!(
                "พบ {} รายการข้อมูลนักเรียนซ้ำซ้อน ตัวอย่าง: {}.",
                self.duplicate_count,
                examples.join(", ")
            ));
        }
        format!(
            "เกิดข้อผิดพลาดในการตรวจสอบไฟล์: {} กรุณาแก้ไขข้อมูลในไฟล์แล้วลองอีกครั้ง",
            parts.join(" ")
        )
    }
}

fn or_na(s: &str) -> &str {
    if s.is_empty() {
        "N/A"
    } else {
        s
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("กรุณาเลือกไฟล์อย่างน้อยหนึ่งไฟล์")]
    NoFiles,
    #[error("รูปแบบไฟล์ไม่ถูกต้องสำหรับไฟล์: {file_name}. กรุณาอัปโหลด .xlsx หรือ .csv เท่านั้น")]
    UnsupportedFileType { file_name: String },
    #[error("ไม่สามารถอ่านไฟล์: {file_name}")]
    ReadFailed { file_name: String, reason: String },
    #[error("เกิดข้อผิดพลาดในการประมวลผลไฟล์: {file_name}")]
    ParseFailed { file_name: String, reason: String },
    #[error("ไม่พบข้อมูลนักเรียนในไฟล์ที่เลือก หรือไฟล์อาจจะว่างเปล่า")]
    Empty,
    #[error("{}", .0.message())]
    Validation(ValidationReport),
}

impl ErrorCode for UploadError {
    fn code(&self) -> &'static str {
        match self {
            UploadError::NoFiles => "bad_params",
            UploadError::UnsupportedFileType { .. } => "unsupported_file_type",
            UploadError::ReadFailed { .. } => "file_read_failed",
            UploadError::ParseFailed { .. } => "file_parse_failed",
            UploadError::Empty => "empty_upload",
            UploadError::Validation(_) => "validation_failed",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            UploadError::UnsupportedFileType { file_name } => Some(json!({ "fileName": file_name })),
            UploadError::ReadFailed { file_name, reason }
            | UploadError::ParseFailed { file_name, reason } => {
                Some(json!({ "fileName": file_name, "reason": reason }))
            }
            UploadError::Validation(report) => serde_json::to_value(report).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_name: String,
    pub students: Vec<StudentRecord>,
}

/// Parses and validates one upload batch. On success the files come back in upload
/// order, ready to become a review queue.
pub fn process_batch(files: &[UploadFile]) -> Result<Vec<ParsedFile>, UploadError> {
    if files.is_empty() {
        return Err(UploadError::NoFiles);
    }

    let parsed = parse_all(files)?;
    let total: usize = parsed.iter().map(|f| f.students.len()).sum();
    if total == 0 {
        return Err(UploadError::Empty);
    }

    let report = validate(parsed.iter().flat_map(|f| f.students.iter()));
    if !report.is_clean() {
        tracing::warn!(
            incomplete = report.incomplete_count,
            duplicates = report.duplicate_count,
            "upload batch rejected"
        );
        return Err(UploadError::Validation(report));
    }

    tracing::info!(files = parsed.len(), students = total, "upload batch parsed");
    Ok(parsed)
}

/// Fan-out one parser thread per file, then join all before returning.
pub fn parse_all(files: &[UploadFile]) -> Result<Vec<ParsedFile>, UploadError> {
    let results: Vec<Result<ParsedFile, UploadError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| scope.spawn(move || parse_file(file)))
            .collect();
        handles
            .into_iter()
            .zip(files)
            .map(|(handle, file)| {
                handle.join().unwrap_or_else(|_| {
                    Err(UploadError::ParseFailed {
                        file_name: file.name.clone(),
                        reason: "parser panicked".to_string(),
                    })
                })
            })
            .collect()
    });
    results.into_iter().collect()
}

pub fn parse_file(file: &UploadFile) -> Result<ParsedFile, UploadError> {
    let Some(kind) = FileKind::detect(file) else {
        return Err(UploadError::UnsupportedFileType {
            file_name: file.name.clone(),
        });
    };
    let rows = match kind {
        FileKind::Xlsx => read_xlsx_rows(file)?,
        FileKind::Csv => read_csv_rows(file)?,
    };
    Ok(ParsedFile {
        file_name: file.name.clone(),
        students: rows_to_students(rows),
    })
}

/// Drops the header row, skips rows with all four columns blank.
pub fn rows_to_students(rows: Vec<Vec<String>>) -> Vec<StudentRecord> {
    rows.into_iter()
        .skip(1)
        .filter_map(|row| {
            let col = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
            let (no, name, grade, classroom) = (col(0), col(1), col(2), col(3));
            if no.is_empty() && name.is_empty() && grade.is_empty() && classroom.is_empty() {
                return None;
            }
            Some(StudentRecord::new(no, name, grade, classroom))
        })
        .collect()
}

fn read_xlsx_rows(file: &UploadFile) -> Result<Vec<Vec<String>>, UploadError> {
    let mut workbook = open_workbook_auto(&file.path).map_err(|e| UploadError::ParseFailed {
        file_name: file.name.clone(),
        reason: e.to_string(),
    })?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range.map_err(|e| UploadError::ParseFailed {
        file_name: file.name.clone(),
        reason: e.to_string(),
    })?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn read_csv_rows(file: &UploadFile) -> Result<Vec<Vec<String>>, UploadError> {
    let bytes = std::fs::read(&file.path).map_err(|e| UploadError::ReadFailed {
        file_name: file.name.clone(),
        reason: e.to_string(),
    })?;
    // Spreadsheet apps prepend a BOM to UTF-8 CSV exports.
    let body: &[u8] = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(body);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| UploadError::ParseFailed {
            file_name: file.name.clone(),
            reason: e.to_string(),
        })?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

/// Incomplete records are collected but skipped for duplicate detection. The first
/// occurrence of a (name, grade, classroom) key is canonical.
pub fn validate<'a, I>(students: I) -> ValidationReport
where
    I: IntoIterator<Item = &'a StudentRecord>,
{
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut report = ValidationReport::default();

    for student in students {
        if !student.is_complete() {
            report.incomplete_count += 1;
            if report.incomplete_examples.len() < EXAMPLE_LIMIT {
                report.incomplete_examples.push(IncompleteExample {
                    roll_number: student.roll_number.clone(),
                    name: student.name.clone(),
                });
            }
            continue;
        }
        if !seen.insert(student.dedup_key()) {
            report.duplicate_count += 1;
            if report.duplicate_examples.len() < EXAMPLE_LIMIT {
                report.duplicate_examples.push(DuplicateExample {
                    name: student.name.clone(),
                    grade: student.grade.clone(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn header_dropped_and_blank_rows_skipped() {
        let students = rows_to_students(rows(&[
            &["เลขที่", "ชื่อ", "ระดับชั้น", "ห้องเรียน"],
            &["1", " สมชาย ", "ป.1", "1"],
            &["", "", "", ""],
            &["2", "สมหญิง"],
        ]));
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].name, "สมชาย");
        assert_eq!(students[1].grade, "");
        assert_eq!(students[1].classroom, "");
        assert_ne!(students[0].id, students[1].id);
    }

    #[test]
    fn duplicates_ignore_roll_number() {
        let a = StudentRecord::new("1", "สมชาย", "ป.1", "1");
        let b = StudentRecord::new("7", "สมชาย", "ป.1", "1");
        let c = StudentRecord::new("8", "สมชาย", "ป.1", "2");
        let report = validate([&a, &b, &c]);
        assert_eq!(report.duplicate_count, 1);
        assert_eq!(report.incomplete_count, 0);
    }

    #[test]
    fn incomplete_records_skip_duplicate_check() {
        let a = StudentRecord::new("1", "", "ป.1", "1");
        let b = StudentRecord::new("2", "", "ป.1", "1");
        let c = StudentRecord::new("3", "x", "", "");
        let report = validate([&a, &b, &c]);
        assert_eq!(report.incomplete_count, 3);
        assert_eq!(report.duplicate_count, 0);
        assert_eq!(report.incomplete_examples.len(), 3);
        assert!(report.message().contains("N/A"));
    }

    #[test]
    fn examples_capped_at_three() {
        let students: Vec<StudentRecord> = (0..6)
            .map(|i| StudentRecord::new(&i.to_string(), "ซ้ำ", "ป.3", ""))
            .collect();
        let report = validate(students.iter());
        assert_eq!(report.duplicate_count, 5);
        assert_eq!(report.duplicate_examples.len(), 3);
    }

    #[test]
    fn validation_message_lists_examples() {
        let a = StudentRecord::new("4", "", "ป.6", "");
        let b = StudentRecord::new("1", "สมชาย", "ป.1", "1");
        let c = StudentRecord::new("2", "สมชาย", "ป.1", "1");
        let message = validate([&a, &b, &c]).message();
        assert!(message.starts_with("เกิดข้อผิดพลาดในการตรวจสอบไฟล์: "));
        assert!(message.contains("พบ 1 รายการข้อมูลไม่สมบูรณ์ (ไม่มีชื่อหรือระดับชั้น) ตัวอย่าง: (เลขที่: 4, ชื่อ: N/A)."));
        assert!(message.contains("พบ 1 รายการข้อมูลนักเรียนซ้ำซ้อน ตัวอย่าง: สมชาย (ชั้น ป.1)."));
        assert!(message.ends_with("กรุณาแก้ไขข้อมูลในไฟล์แล้วลองอีกครั้ง"));

        let unsupported = UploadError::UnsupportedFileType {
            file_name: "roster.txt".to_string(),
        };
        assert_eq!(
            unsupported.to_string(),
            "รูปแบบไฟล์ไม่ถูกต้องสำหรับไฟล์: roster.txt. กรุณาอัปโหลด .xlsx หรือ .csv เท่านั้น"
        );
    }

    #[test]
    fn file_kind_prefers_mime_type() {
        let mut f = UploadFile::new("/tmp/students.csv");
        assert_eq!(FileKind::detect(&f), Some(FileKind::Csv));
        f.mime_type = Some("application/pdf".to_string());
        assert_eq!(FileKind::detect(&f), None);
        let g = UploadFile::new("/tmp/STUDENTS.XLSX");
        assert_eq!(FileKind::detect(&g), Some(FileKind::Xlsx));
        let h = UploadFile::new("/tmp/students.xls");
        assert_eq!(FileKind::detect(&h), None);
    }
}
